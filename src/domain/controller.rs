use crate::domain::commands::Command;
use crate::poll::ControlError;
use async_trait::async_trait;
use std::fmt::Debug;

#[async_trait]
pub trait Controller: Debug + Send + Sync {
    async fn execute(&self, command: Command) -> Result<(), ControlError>;
}
