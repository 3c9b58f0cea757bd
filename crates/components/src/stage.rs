//! Generation stages and the transitions allowed between them

use crate::{GenerationError, Result};
use std::fmt;

/// Where a document is in the Init, Load, Bind, Layout, Write pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum GenerationStage {
    #[default]
    None,
    Initialized,
    Loaded,
    Bound,
    Laidout,
    Written,
    Disposed,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationStage::None => "None",
            GenerationStage::Initialized => "Initialized",
            GenerationStage::Loaded => "Loaded",
            GenerationStage::Bound => "Bound",
            GenerationStage::Laidout => "Laidout",
            GenerationStage::Written => "Written",
            GenerationStage::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}

impl GenerationStage {
    fn disposed_check(self) -> Result<()> {
        if self == GenerationStage::Disposed {
            return Err(stage_error("has been disposed"));
        }
        Ok(())
    }

    /// Init may only run on a fresh document
    pub fn check_can_init(self) -> Result<()> {
        self.disposed_check()?;
        match self {
            GenerationStage::None => Ok(()),
            _ => Err(stage_error("has already been initialized")),
        }
    }

    pub fn check_can_load(self) -> Result<()> {
        self.disposed_check()?;
        match self {
            GenerationStage::Initialized => Ok(()),
            GenerationStage::None => Err(stage_error("has not been initialized")),
            _ => Err(stage_error("has already been loaded")),
        }
    }

    /// Binding follows load, and may be repeated once bound
    pub fn check_can_bind(self) -> Result<()> {
        self.disposed_check()?;
        match self {
            GenerationStage::Loaded | GenerationStage::Bound => Ok(()),
            GenerationStage::None => Err(stage_error("has not been initialized")),
            other => Err(stage_error(&format!("cannot be bound at this stage ({})", other))),
        }
    }

    /// Layout needs loaded content; binding is optional
    pub fn check_can_layout(self) -> Result<()> {
        self.disposed_check()?;
        match self {
            GenerationStage::Loaded | GenerationStage::Bound => Ok(()),
            GenerationStage::None => Err(stage_error("has not been initialized")),
            GenerationStage::Initialized => Err(stage_error("has not been loaded")),
            other => Err(stage_error(&format!("cannot be laid out at this stage ({})", other))),
        }
    }

    pub fn check_can_write(self) -> Result<()> {
        self.disposed_check()?;
        match self {
            GenerationStage::Laidout => Ok(()),
            GenerationStage::Written => Err(stage_error("has already been written")),
            _ => Err(stage_error("has not been laid out")),
        }
    }

    pub fn check_not_disposed(self) -> Result<()> {
        self.disposed_check()
    }
}

fn stage_error(message: &str) -> GenerationError {
    GenerationError::Stage(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<()>) -> String {
        match result {
            Err(GenerationError::Stage(message)) => message,
            other => panic!("expected a stage error, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(GenerationStage::None.check_can_init().is_ok());
        assert!(GenerationStage::Initialized.check_can_load().is_ok());
        assert!(GenerationStage::Loaded.check_can_bind().is_ok());
        assert!(GenerationStage::Bound.check_can_bind().is_ok());
        assert!(GenerationStage::Bound.check_can_layout().is_ok());
        assert!(GenerationStage::Laidout.check_can_write().is_ok());
    }

    #[test]
    fn test_named_failures() {
        assert_eq!(message(GenerationStage::None.check_can_load()), "has not been initialized");
        assert_eq!(message(GenerationStage::Loaded.check_can_load()), "has already been loaded");
        assert!(message(GenerationStage::Initialized.check_can_bind()).starts_with("cannot be bound at this stage"));
        assert!(message(GenerationStage::Written.check_can_bind()).starts_with("cannot be bound at this stage"));
        for check in [
            GenerationStage::check_can_init,
            GenerationStage::check_can_load,
            GenerationStage::check_can_bind,
            GenerationStage::check_can_layout,
            GenerationStage::check_can_write,
        ] {
            assert_eq!(message(check(GenerationStage::Disposed)), "has been disposed");
        }
    }
}
