//! Typed method shims
//!
//! [`method!`](crate::method) bridges the untyped `&[Value]` dispatch
//! calling convention and an ordinary typed closure: it derives the arity
//! from the parameter list, unpacks each argument with
//! [`FromValue`](crate::FromValue), and packs the result with
//! [`IntoValue`](crate::IntoValue). Conversion failures surface as the
//! usual dispatch errors.

/// Builds a [`Method`](crate::Method) from a typed closure.
///
/// The receiver binding comes first, then typed parameters. The body may
/// use `?` on any `Result<_, CallError>`.
///
/// ```
/// use weft_runtime::method;
///
/// let incr = method!(|this, by: i64| -> i64 {
///     let next = this.get_int("count").unwrap_or(0) + by;
///     this.set("count", next)?;
///     next
/// });
/// assert_eq!(incr.arity(), 1);
///
/// let ping = method!(|_this| -> &'static str { "pong" });
/// assert_eq!(ping.arity(), 0);
/// ```
#[macro_export]
macro_rules! method {
    (|$this:ident| -> $ret:ty $body:block) => {
        $crate::Method::new(0, move |$this: $crate::ObjectRef, _: &[$crate::Value]| {
            let __out: $ret = $body;
            Ok($crate::IntoValue::into_value(__out))
        })
    };
    (|$this:ident, $($arg:ident : $ty:ty),+ $(,)?| -> $ret:ty $body:block) => {
        $crate::Method::new(
            [$(stringify!($arg)),+].len(),
            move |$this: $crate::ObjectRef, __args: &[$crate::Value]| {
                let __expected = [$(stringify!($arg)),+].len();
                if __args.len() != __expected {
                    return Err($crate::CallError::raised(format!(
                        "shim expected {} arguments, got {}",
                        __expected,
                        __args.len()
                    )));
                }
                let mut __cursor = __args.iter();
                $(
                    let $arg: $ty = match __cursor.next() {
                        Some(__value) => $crate::FromValue::from_value(__value)?,
                        None => {
                            return Err($crate::CallError::raised(
                                "argument list shorter than declared arity",
                            ))
                        }
                    };
                )+
                let __out: $ret = $body;
                Ok($crate::IntoValue::into_value(__out))
            },
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::object::ObjectRef;
    use crate::value::Value;
    use crate::CallError;

    #[test]
    fn test_zero_arity_shim() {
        let m = method!(|_this| -> i64 { 41 + 1 });
        assert_eq!(m.arity(), 0);
        assert_eq!(m.invoke(ObjectRef::null(), &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_typed_unpacking() {
        let m = method!(|_this, a: i64, b: i64| -> i64 { a * b });
        assert_eq!(m.arity(), 2);
        let out = m
            .invoke(ObjectRef::null(), &[Value::Int(6), Value::Int(7)])
            .unwrap();
        assert_eq!(out, Value::Int(42));
    }

    #[test]
    fn test_type_mismatch_surfaces() {
        let m = method!(|_this, a: i64| -> i64 { a });
        let err = m
            .invoke(ObjectRef::null(), &[Value::Str("nope".into())])
            .unwrap_err();
        assert!(matches!(
            err,
            CallError::TypeMismatch {
                expected: "int",
                found: "str",
            }
        ));
    }

    #[test]
    fn test_unit_return_becomes_nil() {
        let m = method!(|_this, _x: i64| -> () {});
        let out = m.invoke(ObjectRef::null(), &[Value::Int(1)]).unwrap();
        assert_eq!(out, Value::Nil);
    }

    #[test]
    fn test_wrong_raw_arg_count_is_an_error() {
        let m = method!(|_this, a: i64| -> i64 { a });
        assert!(m.invoke(ObjectRef::null(), &[]).is_err());
    }
}
