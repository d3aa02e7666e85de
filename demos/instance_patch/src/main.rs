//! Per-instance patching
//!
//! Three hooks on a single sensor object while its siblings stay stock:
//! an instead advice that clamps one sensor's readings, a one-shot
//! calibration hook that removes itself after the first call, and a
//! before-dealloc observer that sees the object go away. Destroying the
//! sensor cleans its registrations up; the token then reports it.

use weft_core::{hook_object, Advice, AspectError, AspectOptions};
use weft_runtime::{method, selector, store, ClassBuilder, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let sensor = ClassBuilder::new("Sensor")
        .method(
            "read",
            method!(|this, raw: i64| -> i64 {
                this.set("last", raw)?;
                raw
            }),
        )
        .register();

    let noisy = store::alloc(sensor).ok_or("alloc failed")?;
    let steady = store::alloc(sensor).ok_or("alloc failed")?;
    let read = selector("read", 1);

    // Clamp only the noisy sensor; the steady one keeps raw readings.
    let clamp = hook_object(
        noisy,
        read,
        AspectOptions::INSTEAD,
        Advice::replace_args(1, |inv, args| {
            let raw = match args[0].as_int() {
                Some(raw) => raw,
                None => return inv.invoke_original(),
            };
            let clamped = raw.clamp(0, 100);
            if clamped != raw {
                tracing::warn!("clamping reading {} to {}", raw, clamped);
            }
            inv.invoke_original_with(&[Value::Int(clamped)])
        }),
    )?;

    // Calibration notice, gone after the first reading.
    hook_object(
        noisy,
        read,
        AspectOptions::BEFORE | AspectOptions::AUTOMATIC_REMOVAL,
        Advice::observe(|inv| {
            tracing::info!("first reading from {}", inv.receiver());
            Ok(())
        }),
    )?;

    hook_object(
        noisy,
        selector("dealloc", 0),
        AspectOptions::BEFORE,
        Advice::observe(|inv| {
            tracing::info!("{} going away", inv.receiver());
            Ok(())
        }),
    )?;

    for raw in [42, 250, -7] {
        let value = noisy.call("read", &[Value::Int(raw)])?;
        tracing::info!("noisy read({}) = {}", raw, value);
    }
    let value = steady.call("read", &[Value::Int(250)])?;
    tracing::info!("steady read(250) = {}", value);

    noisy.destroy()?;
    match clamp.remove() {
        Err(AspectError::ObjectAlreadyDestroyed) => {
            tracing::info!("clamp token: its object is already gone")
        }
        other => tracing::warn!("unexpected removal result: {:?}", other),
    }

    tracing::info!("{} live entries left", weft_core::live_entry_count());
    Ok(())
}
