//! Per-request cap on tool invocations.

use crate::error::SwitchyardError;

/// Consumed/remaining tool calls for one request. `max_calls == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCallBudget {
    max_calls: Option<u32>,
    used_calls: u32,
}

impl ToolCallBudget {
    pub fn unbounded() -> Self {
        Self {
            max_calls: None,
            used_calls: 0,
        }
    }

    pub fn limited(max_calls: u32) -> Self {
        Self {
            max_calls: Some(max_calls),
            used_calls: 0,
        }
    }

    /// Build from untrusted input. Negative limits are rejected.
    pub fn new(max_calls: Option<i64>) -> Result<Self, SwitchyardError> {
        match max_calls {
            None => Ok(Self::unbounded()),
            Some(n) if n < 0 => Err(SwitchyardError::InvalidArgument(format!(
                "tool call budget must be non-negative, got {n}"
            ))),
            Some(n) => Ok(Self::limited(u32::try_from(n).unwrap_or(u32::MAX))),
        }
    }

    /// Take `amount` calls. Returns `Ok(false)` without mutating when a
    /// finite budget cannot cover the amount.
    pub fn consume(&mut self, amount: i64) -> Result<bool, SwitchyardError> {
        if amount <= 0 {
            return Err(SwitchyardError::InvalidArgument(format!(
                "consume amount must be positive, got {amount}"
            )));
        }
        let amount = u32::try_from(amount).unwrap_or(u32::MAX);
        match self.remaining() {
            None => {
                self.used_calls = self.used_calls.saturating_add(amount);
                Ok(true)
            }
            Some(remaining) if amount > remaining => Ok(false),
            Some(_) => {
                self.used_calls += amount;
                Ok(true)
            }
        }
    }

    pub fn remaining(&self) -> Option<u32> {
        self.max_calls
            .map(|max| max.saturating_sub(self.used_calls))
    }

    pub fn exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_calls.is_none()
    }

    pub fn used(&self) -> u32 {
        self.used_calls
    }

    pub fn max_calls(&self) -> Option<u32> {
        self.max_calls
    }

    pub fn countdown_message(&self) -> Option<String> {
        let max = self.max_calls?;
        let remaining = max.saturating_sub(self.used_calls);
        Some(format!(
            "Tool budget: used {} of {max} — {remaining} remaining.",
            self.used_calls
        ))
    }

    /// Directive appended once the budget is spent.
    ///
    /// # Panics
    ///
    /// Panics on an unbounded budget; callers must check [`Self::is_unbounded`].
    pub fn final_prompt_message(&self) -> String {
        let Some(max) = self.max_calls else {
            panic!("final_prompt_message requested for an unbounded tool budget");
        };
        format!(
            "You have used all {max} available tool calls. Do not request any more tools. \
             Using the information gathered so far, write your final answer now."
        )
    }
}

impl Default for ToolCallBudget {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_tracks_consumption() {
        let mut budget = ToolCallBudget::limited(3);
        assert!(budget.consume(1).unwrap());
        assert!(budget.consume(1).unwrap());
        assert_eq!(budget.remaining(), Some(1));
        assert!(!budget.exhausted());
        assert_eq!(
            budget.countdown_message().unwrap(),
            "Tool budget: used 2 of 3 — 1 remaining."
        );
    }

    #[test]
    fn overdraw_fails_without_mutation() {
        let mut budget = ToolCallBudget::limited(3);
        budget.consume(2).unwrap();
        assert!(!budget.consume(2).unwrap());
        assert_eq!(budget.used(), 2);
        assert!(budget.consume(1).unwrap());
        assert!(budget.exhausted());
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let mut budget = ToolCallBudget::limited(3);
        assert!(matches!(
            budget.consume(0),
            Err(SwitchyardError::InvalidArgument(_))
        ));
        assert!(matches!(
            budget.consume(-1),
            Err(SwitchyardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn negative_construction_is_invalid() {
        assert!(matches!(
            ToolCallBudget::new(Some(-1)),
            Err(SwitchyardError::InvalidArgument(_))
        ));
        assert_eq!(ToolCallBudget::new(Some(0)).unwrap().remaining(), Some(0));
    }

    #[test]
    fn unbounded_budget_never_exhausts() {
        let mut budget = ToolCallBudget::new(None).unwrap();
        assert!(budget.consume(1_000).unwrap());
        assert_eq!(budget.remaining(), None);
        assert!(!budget.exhausted());
        assert_eq!(budget.countdown_message(), None);
    }

    #[test]
    #[should_panic(expected = "unbounded")]
    fn final_prompt_on_unbounded_budget_panics() {
        ToolCallBudget::unbounded().final_prompt_message();
    }

    #[test]
    fn final_prompt_mentions_limit() {
        assert!(ToolCallBudget::limited(1)
            .final_prompt_message()
            .contains("all 1 available tool calls"));
    }
}
