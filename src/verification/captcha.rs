//! Map captcha.

use std::time::Instant;

use crate::messages::MessageKey;
use crate::protocol::packets::world::{ABILITY_ALLOW_FLYING, ABILITY_FLYING};
use crate::protocol::packets::{
    Clientbound, MapData, PlayerAbilities, PlayerPositionRotation, Serverbound, SetContainerSlot,
};

use super::{Result, SessionState, Step, SPAWN_XZ};

/// Position packets between two keep-alives while the player is typing.
const KEEP_ALIVE_INTERVAL: u32 = 20;

pub(crate) struct CaptchaCheck {
    answer: String,
    tries: u32,
    position_packets: u32,
}

impl CaptchaCheck {
    /// Shows the map, or returns `None` when no captcha is ready yet.
    pub fn enter(state: &mut SessionState, _now: Instant) -> Option<Self> {
        let ctx = state.ctx.clone();
        let captcha = ctx.captchas.generate(ctx.config.captcha.answer_length)?;
        let version = state.version();
        let bedrock = state.profile.bedrock;

        // offhand for Java clients, first hotbar slot for Bedrock
        let slot = if bedrock { 36 } else { 40 };
        state.send(Clientbound::SetContainerSlot(SetContainerSlot::filled_map(slot)));
        for map in MapData::from_image(&captcha.image, version) {
            state.send(Clientbound::MapData(map));
        }
        let mut look_down = PlayerPositionRotation::absolute(
            SPAWN_XZ,
            ctx.world.in_air_y as f64,
            SPAWN_XZ,
            ctx.world.first_teleport_id,
        );
        look_down.pitch = 90.0;
        state.send(Clientbound::PlayerPositionRotation(look_down));
        let flags = if bedrock {
            ABILITY_FLYING | ABILITY_ALLOW_FLYING
        } else {
            ABILITY_FLYING
        };
        state.send(Clientbound::PlayerAbilities(PlayerAbilities {
            flags,
            flying_speed: 0.0,
            field_of_view: 0.0,
        }));
        state.send_message(MessageKey::EnterCode);

        Some(Self {
            answer: captcha.answer.to_lowercase(),
            tries: 0,
            position_packets: 0,
        })
    }

    pub fn handle(
        &mut self,
        state: &mut SessionState,
        packet: &Serverbound,
        now: Instant,
    ) -> Result<Step> {
        let elapsed = now.saturating_duration_since(state.login_started);
        ensure_check!(
            elapsed <= state.ctx.captcha_max_duration(),
            "took too long to enter CAPTCHA"
        );

        match packet {
            Serverbound::Chat(chat) => {
                if chat.message.to_lowercase() == self.answer {
                    return Ok(Step::Done);
                }
                self.tries += 1;
                let max_tries = state.ctx.config.captcha.max_tries;
                ensure_check!(self.tries < max_tries, "failed CAPTCHA too often");
                state.send_message(MessageKey::IncorrectCaptcha);
            }
            Serverbound::SetPlayerPosition(_)
            | Serverbound::SetPlayerPositionRotation(_)
            | Serverbound::SetPlayerRotation(_)
            | Serverbound::SetPlayerOnGround(_) => {
                self.position_packets += 1;
                if self.position_packets % KEEP_ALIVE_INTERVAL == 0
                    && state.expected_keep_alive.is_none()
                {
                    state.send_keep_alive();
                }
            }
            _ => {}
        }
        Ok(Step::Stay)
    }
}
