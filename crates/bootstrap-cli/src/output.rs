use bootstrap_core::StepInfo;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// One line per progress event: a JSON object with `json`, otherwise
/// `<id> <action> <state>` followed by the error text, if any.
pub fn print_step(info: &StepInfo, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(info)?);
        return Ok(());
    }
    match &info.error {
        Some(err) => println!(
            "{} {} {}: {}",
            info.step.id, info.step.action, info.state, err
        ),
        None => println!("{} {} {}", info.step.id, info.step.action, info.state),
    }
    Ok(())
}
