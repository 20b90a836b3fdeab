//! Non-interactive "say" command

use std::error::Error;

use crate::core::app::App;

/// Send `prompt` to the active chat and print the reply.
///
/// The exchange is recorded like any interactive turn. A failed exchange
/// still prints its error text, and the command then exits unsuccessfully.
pub async fn run_say(app: &mut App, prompt: &str) -> Result<(), Box<dyn Error>> {
    let outcome = app.send(prompt).await?;
    if outcome.is_failure() {
        return Err(outcome.into_text().into());
    }
    println!("{}", outcome.text());
    Ok(())
}
