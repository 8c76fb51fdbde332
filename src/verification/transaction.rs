//! Window confirmation round trip.

use crate::protocol::packets::{Clientbound, Serverbound, Transaction};

use super::{Result, SessionState, Step};

pub(crate) struct TransactionCheck {
    expected: Option<i32>,
}

impl TransactionCheck {
    pub fn enter(state: &mut SessionState) -> Self {
        let id = -rand::random_range(1..=i16::MAX as i32);
        state.send(Clientbound::Transaction(Transaction {
            window_id: 0,
            id,
            accepted: false,
        }));
        Self { expected: Some(id) }
    }

    pub fn handle(&mut self, _state: &mut SessionState, packet: &Serverbound) -> Result<Step> {
        let Serverbound::Transaction(answer) = packet else {
            return Ok(Step::Stay);
        };
        let expected = self.expected.take();
        ensure_check!(expected.is_some(), "unexpected transaction");
        ensure_check!(answer.window_id == 0, "wrong window ID: {}", answer.window_id);
        ensure_check!(answer.accepted, "didn't accept transaction");
        ensure_check!(
            expected == Some(answer.id),
            "expected T ID {:?}, but got {}",
            expected,
            answer.id
        );
        Ok(Step::Done)
    }
}
