//! Class-wide call logging
//!
//! Attaches before/after advice to every `deposit` and `withdraw` call on
//! an account class, without the account code knowing. Finishes with the
//! registry report, then removes the hooks again.

use weft_core::{hook_class, registry_report, Advice, AspectOptions};
use weft_runtime::{method, selector, store, ClassBuilder, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let account = ClassBuilder::new("Account")
        .method(
            "deposit",
            method!(|this, amount: f64| -> f64 {
                let balance = this.get_float("balance").unwrap_or(0.0) + amount;
                this.set("balance", balance)?;
                balance
            }),
        )
        .method(
            "withdraw",
            method!(|this, amount: f64| -> f64 {
                let balance = this.get_float("balance").unwrap_or(0.0);
                if amount > balance {
                    return Err(weft_runtime::CallError::raised(format!(
                        "insufficient funds: {balance:.2} < {amount:.2}"
                    )));
                }
                let balance = balance - amount;
                this.set("balance", balance)?;
                balance
            }),
        )
        .register();

    let mut tokens = Vec::new();
    for name in ["deposit", "withdraw"] {
        let sel = selector(name, 1);
        tokens.push(hook_class(
            account,
            sel,
            AspectOptions::BEFORE,
            Advice::observe_args(1, move |inv, args| {
                tracing::info!("{} <- {}({})", inv.receiver(), name, args[0]);
                Ok(())
            }),
        )?);
        tokens.push(hook_class(
            account,
            sel,
            AspectOptions::AFTER,
            Advice::observe(move |inv| {
                tracing::info!("{} -> {:?}", name, inv.return_value());
                Ok(())
            }),
        )?);
    }

    let checking = store::alloc(account).ok_or("alloc failed")?;
    let savings = store::alloc(account).ok_or("alloc failed")?;

    checking.call("deposit", &[Value::Float(120.0)])?;
    checking.call("withdraw", &[Value::Float(45.5)])?;
    savings.call("deposit", &[Value::Float(10.0)])?;

    // Overdrafts abort after the before advice has logged the attempt.
    if let Err(err) = savings.call("withdraw", &[Value::Float(99.0)]) {
        tracing::warn!("withdraw refused: {}", err);
    }

    println!("{}", registry_report().to_json()?);

    for token in tokens {
        token.remove()?;
    }
    tracing::info!("hooks removed, {} live entries", weft_core::live_entry_count());
    Ok(())
}
