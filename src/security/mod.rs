pub mod command_executor;
pub mod token_manager;

pub use command_executor::{CommandError, CommandRunner, CommandStatus, SafeCommandExecutor};
pub use token_manager::{SecretMasker, mask_token};
