//! Structural validation of fat files, archives and Mach-O images.
//!
//! The validator never trusts an offset or size it has not checked against
//! the enclosing byte range. Every check yields a [`Verdict`]; a `Bad`
//! verdict carries an error already prefixed with the entity's location so
//! callers can report it as is. Problems with a documented fallback are
//! recorded as [`Advisory`] values instead.
//!
//! - [`Validator::check_fat`] / [`Validator::check_fat_in_archive`]
//! - [`Validator::check_archive`]
//! - [`Validator::check_object`]
//! - [`validate_container`] walks a whole container with a worklist

mod archive;
mod fat;
mod object;
mod overlap;
mod walk;

pub use overlap::*;
pub use walk::*;

use crate::container::Detector;
use crate::error::{Advisory, Error, Result};
use crate::ValidationConfig;

/// Outcome of one structural check.
#[derive(Debug)]
pub enum Verdict {
    /// Every rule held.
    Good,
    /// A rule was violated; the error names the entity.
    Bad(Error),
    /// The bytes are not the kind of entity this check applies to.
    NotApplicable,
}

impl Verdict {
    /// Returns true if every rule held.
    #[inline]
    pub fn is_good(&self) -> bool {
        matches!(self, Verdict::Good)
    }

    /// Returns true if a rule was violated.
    #[inline]
    pub fn is_bad(&self) -> bool {
        matches!(self, Verdict::Bad(_))
    }

    /// The rejection, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Verdict::Bad(err) => Some(err),
            _ => None,
        }
    }

    /// Converts to a `Result`; `NotApplicable` counts as success.
    pub fn into_result(self) -> Result<()> {
        match self {
            Verdict::Bad(err) => Err(err),
            Verdict::Good | Verdict::NotApplicable => Ok(()),
        }
    }

    fn located(result: Result<()>, location: &str) -> Self {
        match result {
            Ok(()) => Verdict::Good,
            Err(err) => Verdict::Bad(err.located(location)),
        }
    }
}

/// Runs structural checks and collects the advisories they raise.
#[derive(Debug)]
pub struct Validator<'d> {
    detector: Detector<'d>,
    advisories: Vec<Advisory>,
}

impl<'d> Validator<'d> {
    /// Creates a validator using `detector` for classification and strictness.
    pub fn new(detector: Detector<'d>) -> Self {
        Self {
            detector,
            advisories: Vec::new(),
        }
    }

    /// The detector used to classify nested entities.
    #[inline]
    pub fn detector(&self) -> &Detector<'d> {
        &self.detector
    }

    /// Strictness switches in effect.
    #[inline]
    pub fn config(&self) -> &ValidationConfig {
        self.detector.config()
    }

    /// Advisories raised so far, oldest first.
    #[inline]
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Drains the collected advisories.
    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }

    fn advise(&mut self, location: &str, message: impl Into<String>) {
        self.advisories.push(Advisory::raise(location, message));
    }

    /// Handles a 64-bit image whose absolute offset is not a multiple of 8:
    /// an error when pointer alignment is required, otherwise one advisory
    /// per enclosing archive.
    fn misaligned_64(&mut self, warned: &mut bool, location: &str) -> Result<()> {
        const MESSAGE: &str =
            "offset in archive not a multiple of 8 (must be since member is a 64-bit object file)";
        if self.config().require_pointer_alignment {
            return Err(Error::archive(MESSAGE));
        }
        if !*warned {
            self.advise(location, MESSAGE);
            *warned = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_into_result() {
        assert!(Verdict::Good.into_result().is_ok());
        assert!(Verdict::NotApplicable.into_result().is_ok());
        let bad = Verdict::located(Err(Error::object("x")), "a.o");
        assert!(bad.is_bad());
        assert_eq!(bad.error().unwrap().to_string(), "a.o: truncated or malformed object (x)");
        assert!(bad.into_result().is_err());
    }

    #[test]
    fn test_misaligned_advisory_raised_once() {
        let mut validator = Validator::new(Detector::default());
        let mut warned = false;
        validator.misaligned_64(&mut warned, "lib.a").unwrap();
        validator.misaligned_64(&mut warned, "lib.a").unwrap();
        assert_eq!(validator.advisories().len(), 1);
        assert_eq!(validator.take_advisories().len(), 1);
        assert!(validator.advisories().is_empty());

        let strict = ValidationConfig {
            require_pointer_alignment: true,
            ..Default::default()
        };
        let mut validator = Validator::new(Detector::new(strict));
        assert!(validator.misaligned_64(&mut false, "lib.a").is_err());
    }
}
