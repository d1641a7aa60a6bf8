// Real pointer clicks through enigo
use super::{InputError, InputExecutor, InputResult};
use enigo::{Enigo, MouseButton, MouseControllable};

#[derive(Debug, Default)]
pub struct EnigoExecutor;

impl EnigoExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl InputExecutor for EnigoExecutor {
    async fn click(&self, x: i32, y: i32) -> InputResult<()> {
        // Enigo handles are not Send on every platform, so build one per click
        // on a blocking thread
        tokio::task::spawn_blocking(move || {
            let mut enigo = Enigo::new();
            enigo.mouse_move_to(x, y);
            enigo.mouse_click(MouseButton::Left);
        })
        .await
        .map_err(|e| InputError::ClickFailed {
            x,
            y,
            description: e.to_string(),
        })?;
        log::debug!("🖱️ Clicked at ({}, {})", x, y);
        Ok(())
    }
}
