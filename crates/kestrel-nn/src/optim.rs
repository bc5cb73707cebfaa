// Optimizer descriptors — per-parameter update settings
//
// The graph builder emits one descriptor for the weights and one for the
// biases of every trainable layer. The update rules themselves live with the
// training loop; a descriptor only carries what the rule needs to know.

use std::fmt;
use std::str::FromStr;

use kestrel_core::error::{Error, Result};

/// Batch size the configured learning rates are quoted for.
pub const REFERENCE_BATCH: f32 = 128.0;

/// Optimizer algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimKind {
    Sgd,
    Nag,
    AdaGrad,
    RmsProp,
    AdaDelta,
    Adam,
}

impl OptimKind {
    pub const ALL: [OptimKind; 6] = [
        OptimKind::Sgd,
        OptimKind::Nag,
        OptimKind::AdaGrad,
        OptimKind::RmsProp,
        OptimKind::AdaDelta,
        OptimKind::Adam,
    ];

    pub fn config_name(self) -> &'static str {
        match self {
            OptimKind::Sgd => "sgd",
            OptimKind::Nag => "nag",
            OptimKind::AdaGrad => "adagrad",
            OptimKind::RmsProp => "rmsprop",
            OptimKind::AdaDelta => "adadelta",
            OptimKind::Adam => "adam",
        }
    }
}

impl FromStr for OptimKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OptimKind::ALL
            .into_iter()
            .find(|k| k.config_name() == s)
            .ok_or_else(|| Error::UnknownOptimizer(s.to_string()))
    }
}

impl fmt::Display for OptimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// Update settings for one parameter tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimDescriptor {
    pub kind: OptimKind,
    /// Algorithm variant selector, passed through untouched.
    pub algo: i32,
    pub lr_base: f32,
    /// Learning rate at the end of the schedule.
    pub lr_last: f32,
    pub wd: f32,
    pub frozen: bool,
}

/// Learning-rate multiplier for `devices` workers each running `batch` items.
pub fn lr_multiplier(devices: usize, batch: usize) -> f32 {
    (devices * batch) as f32 / REFERENCE_BATCH
}

impl fmt::Display for OptimDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} lr {:.6} -> {:.6} wd {}",
            self.kind, self.algo, self.lr_base, self.lr_last, self.wd
        )?;
        if self.frozen {
            write!(f, " [frozen]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optimizers() {
        assert_eq!("adam".parse::<OptimKind>().unwrap(), OptimKind::Adam);
        assert_eq!("rmsprop".parse::<OptimKind>().unwrap(), OptimKind::RmsProp);
        assert!(matches!(
            "lbfgs".parse::<OptimKind>(),
            Err(Error::UnknownOptimizer(_))
        ));
    }

    #[test]
    fn test_lr_multiplier() {
        assert_eq!(lr_multiplier(1, 128), 1.0);
        assert_eq!(lr_multiplier(2, 32), 0.5);
    }
}
