//! Discount Resolver
//!
//! Tracks the discount code typed at the register and the discount it
//! resolved to. Every change of code starts a new generation; a lookup only
//! commits its result if no newer code was entered while it was in flight.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::discounts::{Discount, DiscountProvider};

/// Resolution state of the current discount code
#[derive(Debug, Clone, PartialEq)]
pub enum DiscountStatus {
    /// No code entered
    None,

    /// Lookup for this code is in flight
    Pending(String),

    /// The code resolved to this discount
    Applied(Discount),

    /// The code could not be resolved
    Invalid(String),
}

impl DiscountStatus {
    /// The resolved discount, if any
    pub fn discount(&self) -> Option<&Discount> {
        match self {
            Self::Applied(discount) => Some(discount),
            Self::None | Self::Pending(_) | Self::Invalid(_) => None,
        }
    }

    /// Message to show next to the code input
    pub fn error(&self) -> Option<&'static str> {
        matches!(self, Self::Invalid(_)).then_some("invalid code")
    }
}

impl fmt::Display for DiscountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "no discount"),
            Self::Pending(code) => write!(f, "checking {code}"),
            Self::Applied(discount) => {
                write!(f, "{} ({}%)", discount.code(), discount.percentage())
            }
            Self::Invalid(code) => write!(f, "{code}: invalid code"),
        }
    }
}

#[derive(Debug)]
struct ResolverState {
    code: String,
    generation: u64,
    status: DiscountStatus,
}

/// Resolves discount codes against a [`DiscountProvider`]
pub struct DiscountResolver {
    provider: Arc<dyn DiscountProvider>,
    state: Mutex<ResolverState>,
}

impl fmt::Debug for DiscountResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscountResolver")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl DiscountResolver {
    /// Create a resolver with no code entered
    pub fn new(provider: Arc<dyn DiscountProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(ResolverState {
                code: String::new(),
                generation: 0,
                status: DiscountStatus::None,
            }),
        }
    }

    /// Enter a new code and resolve it.
    ///
    /// The input is trimmed. Re-entering the current code returns the cached
    /// status without another lookup, unless that code failed to resolve, in
    /// which case it is looked up again. An empty code clears the discount
    /// without a lookup. If another code is entered before the lookup
    /// finishes, this lookup's result is dropped and the newer status is
    /// returned. Dropping the returned future mid-lookup forgets the code, so
    /// nothing is left pending.
    #[tracing::instrument(skip(self), fields(generation = tracing::field::Empty))]
    pub async fn set_code(&self, input: &str) -> DiscountStatus {
        let code = input.trim();

        let generation = {
            let mut state = self.lock();

            if state.code == code && !matches!(state.status, DiscountStatus::Invalid(_)) {
                return state.status.clone();
            }

            state.generation = state.generation.wrapping_add(1);
            state.code = code.to_string();
            state.status = if code.is_empty() {
                DiscountStatus::None
            } else {
                DiscountStatus::Pending(code.to_string())
            };

            if code.is_empty() {
                return DiscountStatus::None;
            }

            state.generation
        };

        tracing::Span::current().record("generation", generation);

        let lookup = Lookup {
            state: &self.state,
            generation,
            finished: false,
        };

        let result = self.provider.get_discount_by_code(code).await;

        lookup.finish();

        let mut state = self.lock();

        if state.generation != generation {
            debug!(code, "discarding stale discount lookup");

            return state.status.clone();
        }

        state.status = match result {
            Ok(discount) => {
                debug!(code, percentage = discount.percentage(), "discount applied");

                DiscountStatus::Applied(discount)
            }
            Err(error) => {
                warn!(code, %error, "discount code rejected");

                DiscountStatus::Invalid(code.to_string())
            }
        };

        state.status.clone()
    }

    /// Forget the code and any resolution, including one in flight
    pub fn clear(&self) {
        let mut state = self.lock();

        state.generation = state.generation.wrapping_add(1);
        state.code.clear();
        state.status = DiscountStatus::None;
    }

    /// Current code, trimmed
    pub fn code(&self) -> String {
        self.lock().code.clone()
    }

    /// Current status
    pub fn status(&self) -> DiscountStatus {
        self.lock().status.clone()
    }

    /// The discount to price the order with, if one resolved
    pub fn active(&self) -> Option<Discount> {
        self.lock().status.discount().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A lookup in flight.
///
/// If dropped before finishing while its generation is still current, the
/// code and its pending status are forgotten.
struct Lookup<'r> {
    state: &'r Mutex<ResolverState>,
    generation: u64,
    finished: bool,
}

impl Lookup<'_> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Lookup<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.generation == self.generation {
            debug!(code = %state.code, "discount lookup abandoned");

            state.code.clear();
            state.status = DiscountStatus::None;
        }
    }
}
