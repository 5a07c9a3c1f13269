/// Result of a stage that never fails outright.
///
/// `Degraded` carries the fallback value the pipeline continues with, plus the
/// reason it had to fall back. Callers log the reason; end users never see it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl std::fmt::Display) -> Self {
        Outcome::Degraded {
            value,
            reason: reason.to_string(),
        }
    }

    #[cfg(test)]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Ok(value) | Outcome::Degraded { value, .. } => value,
        }
    }
}
