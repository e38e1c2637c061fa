//! Game phases and the fixed table of legal transitions between them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Phase {
    /// Created, nobody registered yet.
    Waiting,
    /// Participants join and place their opening bets.
    Betting,
    /// Two cards to every hand and the dealer.
    Dealing,
    /// Double down, split and insurance offers, one turn at a time.
    SpecialBets,
    /// Hit/stand, one turn at a time.
    Playing,
    /// Dealer draws to 17.
    Dealer,
    /// Final. Payouts can be settled.
    Complete,
}

impl Phase {
    /// Whether `self -> next` is in the transition table. Nothing outside
    /// this table is ever allowed, including staying put.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Betting)
                | (Self::Betting, Self::Dealing)
                | (Self::Dealing, Self::SpecialBets)
                | (Self::Dealing, Self::Playing)
                | (Self::SpecialBets, Self::Playing)
                | (Self::Playing, Self::Dealer)
                | (Self::Dealer, Self::Complete)
        )
    }

    /// Phases in which participants act in turn order.
    #[must_use]
    pub const fn is_turn_based(self) -> bool {
        matches!(self, Self::SpecialBets | Self::Playing)
    }

    /// Phases before any card is dealt; a game here can still be
    /// cancelled and refunded.
    #[must_use]
    pub const fn is_pre_deal(self) -> bool {
        matches!(self, Self::Waiting | Self::Betting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Betting => "betting",
            Self::Dealing => "dealing",
            Self::SpecialBets => "special bets",
            Self::Playing => "playing",
            Self::Dealer => "dealer",
            Self::Complete => "complete",
        };
        write!(f, "{repr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 7] = [
        Phase::Waiting,
        Phase::Betting,
        Phase::Dealing,
        Phase::SpecialBets,
        Phase::Playing,
        Phase::Dealer,
        Phase::Complete,
    ];

    #[test]
    fn test_transition_table_has_seven_edges() {
        let edges = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .count();
        assert_eq!(edges, 7);
    }

    #[test]
    fn test_special_bets_is_optional() {
        assert!(Phase::Dealing.can_transition_to(Phase::SpecialBets));
        assert!(Phase::Dealing.can_transition_to(Phase::Playing));
    }

    #[test]
    fn test_no_backwards_or_self_transitions() {
        for phase in ALL {
            assert!(!phase.can_transition_to(phase));
        }
        assert!(!Phase::Playing.can_transition_to(Phase::SpecialBets));
        assert!(!Phase::Complete.can_transition_to(Phase::Waiting));
    }
}
