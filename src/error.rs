use std::error::Error;
use std::fmt;
use std::time::Duration;

/// The error type a lookup function may return.
pub type LookupError = Box<dyn Error + Send + Sync>;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// A `default_ttl` of zero was configured. Values stored without an
  /// explicit expiry would be dead on arrival; omit the TTL instead.
  InvalidDuration(Duration),
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::InvalidDuration(d) => {
        write!(f, "duration must be greater than 0: {:?}", d)
      }
    }
  }
}

impl Error for BuildError {}

/// Errors surfaced by `load_or_compute`.
#[derive(Debug)]
pub enum LoadError {
  /// The key was absent or expired and no lookup function was configured.
  NoLookupDefined,
  /// The configured lookup function returned an error. The slot was left
  /// empty; a later call will invoke the lookup again.
  Lookup(LookupError),
}

impl fmt::Display for LoadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoadError::NoLookupDefined => write!(f, "no lookup function set"),
      LoadError::Lookup(err) => write!(f, "lookup failed: {}", err),
    }
  }
}

impl Error for LoadError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      LoadError::NoLookupDefined => None,
      LoadError::Lookup(err) => Some(&**err as &(dyn Error + 'static)),
    }
  }
}
