//! World entry, teleport confirmation and the free-fall check.
//!
//! The player is dropped above an invisible platform and has to fall along
//! the vanilla gravity curve until it lands on the platform's exact top.

use std::sync::Arc;

use crate::config::Gamemode;
use crate::messages::MessageKey;
use crate::protocol::packets::world::{RELATIVE_Y, START_WAITING_FOR_CHUNKS};
use crate::protocol::packets::{
    BlockUpdate, ChunkData, Clientbound, GameEvent, JoinGame, PlayerAbilities,
    PlayerPositionRotation, Serverbound, SetDefaultSpawnPosition, SetPlayerPositionRotation,
    UpdateSectionBlocks,
};
use crate::protocol::types::BlockType;
use crate::protocol::ProtocolVersion;

use super::{
    ConnectionPhase, Result, SessionState, Step, VerificationError, BLOCKS_PER_ROW, SPAWN_XZ,
};

const GRAVITY: f64 = 0.08;
const DRAG: f64 = 0.98f32 as f64;

/// Vertical motion one tick after `last`.
pub fn next_fall_motion(last: f64) -> f64 {
    (last - GRAVITY) * DRAG
}

/// Upper bound of the distance fallen in `ticks` ticks, used to place the
/// spawn high enough above the platform.
pub fn fall_distance(ticks: u32) -> f64 {
    let mut motion = 0.0f64;
    let mut total = 0.0;
    for _ in 0..ticks {
        motion = (motion - 0.1) * DRAG;
        total += motion.abs();
    }
    total
}

pub(crate) struct Gravity {
    gravity_check: bool,
    collision_check: bool,
    teleported: bool,
    can_fall: bool,
    checking: bool,
    expected_teleport_id: i32,
    y: f64,
    delta_y: f64,
    block_height: f64,
    movement_tick: u32,
    client_tick: u32,
    buffered: Option<SetPlayerPositionRotation>,
}

impl Gravity {
    pub fn enter(state: &mut SessionState) -> Self {
        let ctx = state.ctx.clone();
        let world = ctx.world;
        let version = state.version();
        let bedrock = state.profile.bedrock;
        let gravity_check = !bedrock && ctx.config.gravity.enabled;
        let collision_check = !bedrock && ctx.config.gravity.check_collisions;

        let mut join = JoinGame::new(world.player_entity_id, state.gamemode().id());
        join.dimension_codec = ctx.registry.dimension_codec(version);
        join.dimension_element = ctx.registry.dimension_element(version);
        state.send(Clientbound::JoinGame(Box::new(join)));
        if state.gamemode() == Gamemode::Creative {
            state.send(Clientbound::PlayerAbilities(PlayerAbilities {
                flags: 0,
                flying_speed: 0.0,
                field_of_view: 0.0,
            }));
        }
        if version >= ProtocolVersion::V1_19_3 {
            state.send(Clientbound::SetDefaultSpawnPosition(SetDefaultSpawnPosition {
                x: SPAWN_XZ as i32,
                y: world.in_air_y,
                z: SPAWN_XZ as i32,
            }));
        }
        if version >= ProtocolVersion::V1_8 {
            let park = PlayerPositionRotation::absolute(
                SPAWN_XZ,
                world.in_air_y as f64,
                SPAWN_XZ,
                world.first_teleport_id,
            );
            let mut drop = PlayerPositionRotation::absolute(
                SPAWN_XZ,
                (world.spawn_y - world.in_air_y) as f64,
                SPAWN_XZ,
                world.second_teleport_id,
            );
            drop.pitch = -90.0;
            drop.relative = RELATIVE_Y;
            state.send(Clientbound::PlayerPositionRotation(park));
            state.send(Clientbound::PlayerPositionRotation(drop));
        } else {
            // no relative teleports on 1.7
            let mut drop =
                PlayerPositionRotation::absolute(SPAWN_XZ, world.spawn_y as f64, SPAWN_XZ, 0);
            drop.pitch = -90.0;
            state.send(Clientbound::PlayerPositionRotation(drop));
        }
        if version >= ProtocolVersion::V1_20_3 {
            state.send(Clientbound::GameEvent(GameEvent {
                event: START_WAITING_FOR_CHUNKS,
                value: 0.0,
            }));
        }
        state.send(Clientbound::ChunkData(ChunkData { x: 0, z: 0 }));

        let mut block_height = 0.0;
        if collision_check {
            let block = BlockType::random();
            block_height = block.height();
            let start = SPAWN_XZ as i32 - BLOCKS_PER_ROW / 2;
            let blocks = (start..start + BLOCKS_PER_ROW)
                .flat_map(|x| {
                    (start..start + BLOCKS_PER_ROW).map(move |z| BlockUpdate {
                        x,
                        y: world.platform_y,
                        z,
                        block,
                    })
                })
                .collect();
            state.send(Clientbound::UpdateSectionBlocks(UpdateSectionBlocks {
                section_x: 0,
                section_z: 0,
                blocks,
            }));
        }

        Self {
            gravity_check,
            collision_check,
            // nothing to confirm before 1.9
            teleported: version < ProtocolVersion::V1_9,
            can_fall: bedrock,
            checking: false,
            expected_teleport_id: world.first_teleport_id,
            y: 0.0,
            delta_y: 0.0,
            block_height,
            movement_tick: 0,
            client_tick: 0,
            buffered: None,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        if self.teleported {
            ConnectionPhase::Position
        } else {
            ConnectionPhase::Teleport
        }
    }

    pub fn handle(&mut self, state: &mut SessionState, packet: &Serverbound) -> Result<Step> {
        let version = state.version();
        match packet {
            Serverbound::SetPlayerPositionRotation(position) => {
                if self.teleported {
                    let p = position;
                    return self.movement(state, p.x, p.y, p.z, p.flags.on_ground, true);
                }
                if version >= ProtocolVersion::V1_21_2 {
                    self.buffered = Some(*position);
                }
            }
            Serverbound::SetPlayerPosition(p) => {
                if self.teleported {
                    return self.movement(state, p.x, p.y, p.z, p.flags.on_ground, false);
                }
            }
            Serverbound::ConfirmTeleport(confirm) => {
                ensure_check!(!self.teleported, "duplicate teleport confirm");
                ensure_check!(
                    confirm.teleport_id == self.expected_teleport_id,
                    "expected TP ID {}, but got {}",
                    self.expected_teleport_id,
                    confirm.teleport_id
                );
                let world = state.ctx.world;
                if self.expected_teleport_id == world.first_teleport_id {
                    self.buffered = None;
                    self.expected_teleport_id = world.second_teleport_id;
                } else {
                    self.teleported = true;
                    if version >= ProtocolVersion::V1_21_2 {
                        let Some(p) = self.buffered.take() else {
                            return Err(VerificationError::Check(
                                "expected position rotation but got teleport confirm".into(),
                            ));
                        };
                        return self.movement(state, p.x, p.y, p.z, p.flags.on_ground, true);
                    }
                }
            }
            Serverbound::ClientInformation(info) => {
                let mut details = std::mem::take(&mut state.details);
                let result = details.on_client_information(state, info);
                state.details = details;
                result?;
            }
            Serverbound::PluginMessage(message) => {
                let mut details = std::mem::take(&mut state.details);
                let result = details.on_plugin_message(state, message);
                state.details = details;
                result?;
            }
            Serverbound::ClientTickEnd => self.client_tick += 1,
            _ => {}
        }
        Ok(Step::Stay)
    }

    fn movement(
        &mut self,
        state: &mut SessionState,
        x: f64,
        y: f64,
        z: f64,
        on_ground: bool,
        rotated: bool,
    ) -> Result<Step> {
        let ctx = Arc::clone(&state.ctx);
        let config = &ctx.config.gravity;
        let world = ctx.world;
        let version = state.version();

        if !self.checking {
            if !self.gravity_check && !self.collision_check {
                return self.passed(state);
            }
            ensure_check!(rotated, "illegal movement packet order");
            ensure_check!(!on_ground, "illegal ground state on teleport");
            ensure_check!(x == SPAWN_XZ, "invalid x: {}", x);
            ensure_check!(z == SPAWN_XZ, "invalid z: {}", z);
            self.y = world.spawn_y as f64;
            self.checking = true;
            state.send_message(MessageKey::Welcome);
            return Ok(Step::Stay);
        }

        let last_delta_y = self.delta_y;
        let last_y = self.y;
        self.delta_y = y - last_y;
        self.y = y;
        tracing::trace!(
            "[verify] [position] user={} x={} y={} z={} ly={} dy={} ground={}",
            state.profile.username,
            x,
            y,
            z,
            last_y,
            self.delta_y,
            on_ground
        );

        if y < world.platform_y as f64 {
            let reason = format!("fell through blocks: {}/{}/{}", y, self.delta_y, self.movement_tick);
            return self.fail_or_captcha(state, reason);
        }
        let edge = BLOCKS_PER_ROW as f64;
        ensure_check!((x.abs() - edge).abs() < edge, "illegal x offset: {}", x);
        ensure_check!((z.abs() - edge).abs() < edge, "illegal z offset: {}", z);
        if version >= ProtocolVersion::V1_21_2 {
            ensure_check!(
                self.client_tick >= self.movement_tick,
                "invalid ticking: {}/{}",
                self.client_tick,
                self.movement_tick
            );
        }

        if !on_ground {
            if self.delta_y == 0.0 {
                ensure_check!(rotated, "illegal movement packet order: {}", self.delta_y);
                ensure_check!(self.movement_tick == 0, "illegal y motion: {}", self.movement_tick);
                // 1.7 clients fall on the same tick
                if version < ProtocolVersion::V1_8 {
                    self.movement_tick += 1;
                }
                self.can_fall = true;
                return Ok(Step::Stay);
            }
            ensure_check!(self.can_fall, "unexpected y motion: {}", self.delta_y);
            self.movement_tick += 1;

            if self.gravity_check {
                let predicted = next_fall_motion(last_delta_y);
                if (self.delta_y - predicted).abs() > config.tolerance {
                    let reason =
                        format!("incorrect gravity: {}/{}/{}", predicted, self.delta_y, y);
                    return self.fail_or_captcha(state, reason);
                }
                if !self.collision_check && self.movement_tick == config.max_movement_ticks {
                    return self.passed(state);
                }
            }
        } else if self.collision_check {
            if self.gravity_check {
                self.movement_tick += 1;
                if self.movement_tick < config.max_movement_ticks {
                    let reason = format!(
                        "illegal collision tick: {}/{}",
                        self.movement_tick, self.block_height
                    );
                    return self.fail_or_captcha(state, reason);
                }
            }
            let offset = (world.platform_y as f64 + self.block_height) - y;
            if offset != 0.0 {
                let reason = format!("illegal collision: {}/{}/{}", offset, y, self.block_height);
                return self.fail_or_captcha(state, reason);
            }
            return self.passed(state);
        }
        Ok(Step::Stay)
    }

    fn passed(&mut self, state: &mut SessionState) -> Result<Step> {
        self.teleported = false;
        // 1.20.2+ clients were checked at the end of configuration
        if !state.profile.bedrock && !state.version().has_configuration_phase() {
            state.details.require_complete()?;
        }
        Ok(Step::Done)
    }

    fn fail_or_captcha(&mut self, state: &mut SessionState, reason: String) -> Result<Step> {
        if !state.ctx.config.gravity.captcha_on_fail {
            return Err(VerificationError::Check(reason));
        }
        tracing::debug!(
            "[verify] [gravity] user={} forcing captcha: {}",
            state.profile.username,
            reason
        );
        state.force_captcha = true;
        self.passed(state)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{context, joined};
    use super::super::{ConnectionPhase, Session};
    use super::*;
    use crate::protocol::packets::{ConfirmTeleport, MovementFlags, SetPlayerPosition};
    use std::time::Instant;

    fn block_height(sent: &[Clientbound]) -> Option<f64> {
        sent.iter().find_map(|packet| match packet {
            Clientbound::UpdateSectionBlocks(update) => Some(update.blocks[0].block.height()),
            _ => None,
        })
    }

    fn position(x: f64, y: f64, z: f64, on_ground: bool) -> Serverbound {
        Serverbound::SetPlayerPosition(SetPlayerPosition {
            x,
            y,
            z,
            flags: MovementFlags::on_ground(on_ground),
        })
    }

    fn rotated(y: f64) -> Serverbound {
        Serverbound::SetPlayerPositionRotation(SetPlayerPositionRotation {
            x: SPAWN_XZ,
            y,
            z: SPAWN_XZ,
            yaw: 0.0,
            pitch: -90.0,
            flags: MovementFlags::on_ground(false),
        })
    }

    /// Confirms both teleports and sends the two sync packets.
    fn arm(session: &mut Session) -> f64 {
        let world = session.state.ctx.world;
        let now = Instant::now();
        for teleport_id in [world.first_teleport_id, world.second_teleport_id] {
            session
                .handle(Serverbound::ConfirmTeleport(ConfirmTeleport { teleport_id }), now)
                .unwrap();
        }
        let spawn_y = world.spawn_y as f64;
        session.handle(rotated(spawn_y), now).unwrap();
        session.handle(rotated(spawn_y), now).unwrap();
        spawn_y
    }

    /// Falls along the vanilla curve until the platform top is reached.
    fn fall(session: &mut Session, mut y: f64, top: f64) -> super::super::Result<super::super::Progress> {
        let now = Instant::now();
        let mut motion = 0.0;
        loop {
            motion = next_fall_motion(motion);
            if y + motion <= top {
                return session.handle(position(SPAWN_XZ, top, SPAWN_XZ, true), now);
            }
            y += motion;
            let progress = session.handle(position(SPAWN_XZ, y, SPAWN_XZ, false), now)?;
            if progress != super::super::Progress::Continue || session.phase() != ConnectionPhase::Position {
                return Ok(progress);
            }
        }
    }

    #[test]
    fn test_fall_distance_grows_with_ticks() {
        assert_eq!(fall_distance(0), 0.0);
        let mut last = 0.0;
        for ticks in 1..20 {
            let distance = fall_distance(ticks);
            assert!(distance > last);
            last = distance;
        }
        // reproducible
        assert_eq!(fall_distance(8), fall_distance(8));
    }

    #[test]
    fn test_fall_curve_is_monotonic() {
        let mut motion = 0.0;
        for _ in 0..50 {
            let next = next_fall_motion(motion);
            assert!(next < motion);
            motion = next;
        }
        assert!((next_fall_motion(0.0) + 0.0784).abs() < 1e-7);
    }

    #[test]
    fn test_world_entry_packets() {
        let ctx = context("{}");
        let (session, sent) = joined(&ctx);
        assert_eq!(session.phase(), ConnectionPhase::Teleport);
        assert!(matches!(sent[0], Clientbound::JoinGame(_)));
        let teleports: Vec<_> = sent
            .iter()
            .filter_map(|packet| match packet {
                Clientbound::PlayerPositionRotation(teleport) => Some(*teleport),
                _ => None,
            })
            .collect();
        assert_eq!(teleports.len(), 2);
        assert_eq!(teleports[0].relative, 0);
        assert_eq!(teleports[1].relative, RELATIVE_Y);
        assert_eq!(
            teleports[0].y + teleports[1].y,
            ctx.world.spawn_y as f64
        );
        let update = sent
            .iter()
            .find_map(|packet| match packet {
                Clientbound::UpdateSectionBlocks(update) => Some(update),
                _ => None,
            })
            .unwrap();
        assert_eq!(update.blocks.len(), 64);
        assert!(update.blocks.iter().all(|b| (4..12).contains(&b.x) && (4..12).contains(&b.z)));
    }

    #[test]
    fn test_vanilla_fall_passes() {
        let ctx = context("vehicle:\n  enabled: false\ncaptcha:\n  timing: never\n");
        let (mut session, sent) = joined(&ctx);
        let top = ctx.world.platform_y as f64 + block_height(&sent).unwrap();
        let y = arm(&mut session);
        assert_eq!(session.phase(), ConnectionPhase::Position);
        fall(&mut session, y, top).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Transaction);
    }

    #[test]
    fn test_off_curve_delta_fails() {
        let ctx = context("{}");
        let (mut session, _) = joined(&ctx);
        let y = arm(&mut session);
        let motion = next_fall_motion(0.0);
        let now = Instant::now();
        session
            .handle(position(SPAWN_XZ, y + motion, SPAWN_XZ, false), now)
            .unwrap();
        let off = next_fall_motion(motion) + 1e-4;
        let err = session
            .handle(position(SPAWN_XZ, y + motion + off, SPAWN_XZ, false), now)
            .unwrap_err();
        assert!(err.to_string().starts_with("incorrect gravity"), "{}", err);
        assert_eq!(session.phase(), ConnectionPhase::Failed);
    }

    #[test]
    fn test_gravity_failure_can_force_captcha() {
        let ctx = context("gravity:\n  captcha_on_fail: true\n");
        let (mut session, _) = joined(&ctx);
        let y = arm(&mut session);
        session
            .handle(position(SPAWN_XZ, y - 5.0, SPAWN_XZ, false), Instant::now())
            .unwrap();
        assert!(session.state.force_captcha);
        assert_eq!(session.phase(), ConnectionPhase::Transaction);
    }

    #[test]
    fn test_spoofed_ground_fails() {
        let ctx = context("{}");
        let (mut session, _) = joined(&ctx);
        let y = arm(&mut session);
        let err = session
            .handle(position(SPAWN_XZ, y, SPAWN_XZ, true), Instant::now())
            .unwrap_err();
        assert!(err.to_string().starts_with("illegal collision tick"), "{}", err);
    }

    #[test]
    fn test_first_movement_must_be_at_spawn() {
        let ctx = context("{}");
        let (mut session, _) = joined(&ctx);
        let world = ctx.world;
        let now = Instant::now();
        for teleport_id in [world.first_teleport_id, world.second_teleport_id] {
            session
                .handle(Serverbound::ConfirmTeleport(ConfirmTeleport { teleport_id }), now)
                .unwrap();
        }
        let err = session
            .handle(position(SPAWN_XZ, 100.0, SPAWN_XZ, false), now)
            .unwrap_err();
        assert_eq!(err.to_string(), "illegal movement packet order");
    }

    #[test]
    fn test_teleport_confirm_order() {
        let ctx = context("{}");
        let world = ctx.world;
        let now = Instant::now();

        let (mut session, _) = joined(&ctx);
        let err = session
            .handle(
                Serverbound::ConfirmTeleport(ConfirmTeleport {
                    teleport_id: world.second_teleport_id,
                }),
                now,
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("expected TP ID"));

        let (mut session, _) = joined(&ctx);
        arm(&mut session);
        let err = session
            .handle(
                Serverbound::ConfirmTeleport(ConfirmTeleport {
                    teleport_id: world.second_teleport_id,
                }),
                now,
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate teleport confirm");
    }

    #[test]
    fn test_checks_disabled_pass_on_first_packet() {
        let ctx = context(
            "gravity:\n  enabled: false\n  check_collisions: false\nvehicle:\n  enabled: false\ncaptcha:\n  timing: never\n",
        );
        let (mut session, sent) = joined(&ctx);
        assert!(block_height(&sent).is_none());
        let world = ctx.world;
        let now = Instant::now();
        for teleport_id in [world.first_teleport_id, world.second_teleport_id] {
            session
                .handle(Serverbound::ConfirmTeleport(ConfirmTeleport { teleport_id }), now)
                .unwrap();
        }
        session.handle(position(1.0, 2.0, 3.0, true), now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Transaction);
    }

    #[test]
    fn test_without_collisions_passes_after_max_ticks() {
        let ctx = context("gravity:\n  check_collisions: false\n  max_movement_ticks: 4\n");
        let (mut session, _) = joined(&ctx);
        let mut y = arm(&mut session);
        let now = Instant::now();
        let mut motion = 0.0;
        for tick in 1..=4 {
            motion = next_fall_motion(motion);
            y += motion;
            session.handle(position(SPAWN_XZ, y, SPAWN_XZ, false), now).unwrap();
            let expected = if tick < 4 {
                ConnectionPhase::Position
            } else {
                ConnectionPhase::Transaction
            };
            assert_eq!(session.phase(), expected, "tick {}", tick);
        }
    }

    /// 1.21.4 session through configuration with the first teleport confirmed.
    fn modern_after_first_confirm(ctx: &std::sync::Arc<super::super::VerificationContext>) -> Session {
        use super::super::tests::{keep_alive_id, packets, session};
        use crate::protocol::packets::{ClientInformation, KeepAlive, PluginMessage};

        let version = ProtocolVersion::V1_21_4;
        let mut session = session(ctx, version);
        let now = Instant::now();
        session.start(now).unwrap();
        session.handle(Serverbound::LoginAcknowledged, now).unwrap();
        let id = keep_alive_id(&packets(&mut session));
        session.handle(Serverbound::KeepAlive(KeepAlive { id }), now).unwrap();
        session
            .handle(Serverbound::ClientInformation(ClientInformation::default()), now)
            .unwrap();
        session
            .handle(Serverbound::PluginMessage(PluginMessage::brand("vanilla", version)), now)
            .unwrap();
        session.handle(Serverbound::FinishConfiguration, now).unwrap();
        session
            .handle(
                Serverbound::ConfirmTeleport(ConfirmTeleport {
                    teleport_id: ctx.world.first_teleport_id,
                }),
                now,
            )
            .unwrap();
        session
    }

    #[test]
    fn test_modern_client_position_is_replayed_on_confirm() {
        let ctx = context("{}");
        let mut session = modern_after_first_confirm(&ctx);
        let now = Instant::now();
        let spawn_y = ctx.world.spawn_y as f64;
        session.handle(rotated(spawn_y), now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Teleport);
        session
            .handle(
                Serverbound::ConfirmTeleport(ConfirmTeleport {
                    teleport_id: ctx.world.second_teleport_id,
                }),
                now,
            )
            .unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Position);
        // the replayed packet synced the spawn, so the next one arms the fall
        session.handle(rotated(spawn_y), now).unwrap();
        session.handle(Serverbound::ClientTickEnd, now).unwrap();
        let y = spawn_y + next_fall_motion(0.0);
        session.handle(position(SPAWN_XZ, y, SPAWN_XZ, false), now).unwrap();
        assert_eq!(session.phase(), ConnectionPhase::Position);
    }

    #[test]
    fn test_modern_client_must_send_position_before_confirm() {
        let ctx = context("{}");
        let mut session = modern_after_first_confirm(&ctx);
        let err = session
            .handle(
                Serverbound::ConfirmTeleport(ConfirmTeleport {
                    teleport_id: ctx.world.second_teleport_id,
                }),
                Instant::now(),
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("expected position rotation"), "{}", err);
    }

    #[test]
    fn test_modern_client_cannot_move_faster_than_it_ticks() {
        let ctx = context("{}");
        let mut session = modern_after_first_confirm(&ctx);
        let now = Instant::now();
        let spawn_y = ctx.world.spawn_y as f64;
        session.handle(rotated(spawn_y), now).unwrap();
        session
            .handle(
                Serverbound::ConfirmTeleport(ConfirmTeleport {
                    teleport_id: ctx.world.second_teleport_id,
                }),
                now,
            )
            .unwrap();
        session.handle(rotated(spawn_y), now).unwrap();
        let mut y = spawn_y;
        let mut motion = 0.0;
        session.handle(Serverbound::ClientTickEnd, now).unwrap();
        let mut result = Ok(super::super::Progress::Continue);
        // one tick for three movements
        for _ in 0..3 {
            motion = next_fall_motion(motion);
            y += motion;
            result = session.handle(position(SPAWN_XZ, y, SPAWN_XZ, false), now);
            if result.is_err() {
                break;
            }
        }
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("invalid ticking"), "{}", err);
    }
}
