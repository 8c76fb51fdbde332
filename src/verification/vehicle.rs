//! Boat and minecart ride.
//!
//! The player is mounted on a boat, dismounted, mounted on a minecart and
//! dismounted again. Every change of state waits for a fresh keep-alive so
//! late packets of the previous state cannot count for the next one.

use crate::protocol::packets::{
    Clientbound, RemoveEntities, Serverbound, SetPassengers, SpawnEntity,
};
use crate::protocol::types::EntityType;
use crate::protocol::ProtocolVersion;

use super::{Result, SessionState, Step, SPAWN_XZ};

/// Per-tick boat acceleration while falling.
const BOAT_GRAVITY: f64 = 0.03999999910593033;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ride {
    Waiting,
    InBoat,
    InAirAfterBoat,
    InMinecart,
    InAirAfterMinecart,
}

impl Ride {
    fn in_vehicle(self) -> bool {
        matches!(self, Ride::InBoat | Ride::InMinecart)
    }
}

pub(crate) struct VehicleCheck {
    ride: Ride,
    next: Option<Ride>,
    rotations: u32,
    inputs: u32,
    paddles: u32,
    moves: u32,
    boat_y: f64,
    boat_motion: f64,
}

impl VehicleCheck {
    pub fn enter(state: &mut SessionState) -> Self {
        let mut check = Self {
            ride: Ride::Waiting,
            next: None,
            rotations: 0,
            inputs: 0,
            paddles: 0,
            moves: 0,
            boat_y: state.ctx.world.in_air_y as f64,
            boat_motion: 0.0,
        };
        check.mount(state, Ride::InBoat);
        check
    }

    fn mount(&mut self, state: &mut SessionState, next: Ride) {
        let world = state.ctx.world;
        let entity_type = if next == Ride::InBoat {
            EntityType::Boat
        } else {
            EntityType::Minecart
        };
        state.send(Clientbound::SpawnEntity(SpawnEntity::new(
            world.vehicle_entity_id,
            entity_type,
            SPAWN_XZ,
            world.in_air_y as f64,
            SPAWN_XZ,
        )));
        state.send(Clientbound::SetPassengers(SetPassengers {
            vehicle_id: world.vehicle_entity_id,
            passenger_ids: vec![world.player_entity_id],
        }));
        self.prepare(state, next);
    }

    fn prepare(&mut self, state: &mut SessionState, next: Ride) {
        self.next = Some(next);
        self.rotations = 0;
        self.inputs = 0;
        self.paddles = 0;
        self.moves = 0;
        state.send_keep_alive();
    }

    pub fn handle(&mut self, state: &mut SessionState, packet: &Serverbound) -> Result<Step> {
        if let Serverbound::KeepAlive(_) = packet {
            // the id was matched before the packet got here
            let Some(next) = self.next.take() else {
                return Err(super::VerificationError::Check("invalid packet timing".into()));
            };
            tracing::trace!(
                "[verify] [vehicle] user={} {:?} -> {:?}",
                state.profile.username,
                self.ride,
                next
            );
            self.ride = next;
            return Ok(Step::Stay);
        }
        if self.next.is_some() {
            return Ok(Step::Stay);
        }

        let version = state.version();
        let bedrock = state.profile.bedrock;
        match packet {
            Serverbound::PaddleBoat(_) => {
                ensure_check!(self.ride == Ride::InBoat, "invalid state: got paddle in {:?}", self.ride);
                self.paddles += 1;
            }
            Serverbound::VehicleMove(vehicle) => {
                ensure_check!(
                    self.ride.in_vehicle(),
                    "invalid state: got vehicle move in {:?}",
                    self.ride
                );
                let in_air_y = state.ctx.world.in_air_y as f64;
                ensure_check!(vehicle.y <= in_air_y, "bad vehicle y: {}", vehicle.y);
                if !bedrock {
                    let last_motion = self.boat_motion;
                    let last_y = self.boat_y;
                    self.boat_y = vehicle.y;
                    self.boat_motion = self.boat_y - last_y;
                    let predicted = last_motion - BOAT_GRAVITY;
                    ensure_check!(
                        (self.boat_motion - predicted).abs() < state.ctx.config.vehicle.tolerance,
                        "bad vehicle gravity: {}/{}",
                        predicted,
                        self.boat_motion
                    );
                }
                // 1.21.2+ stopped sending inputs while riding
                if version >= ProtocolVersion::V1_21_2 {
                    self.on_input(state)?;
                }
                self.moves += 1;
            }
            Serverbound::SetPlayerRotation(_) => {
                if self.ride.in_vehicle() {
                    self.rotations += 1;
                    // 1.21.2+ minecart riders send nothing but rotations
                    if version >= ProtocolVersion::V1_21_2 && self.ride == Ride::InMinecart {
                        self.on_input(state)?;
                    }
                }
            }
            Serverbound::PlayerInput(input) => {
                ensure_check!(
                    self.ride.in_vehicle(),
                    "invalid state: got input in {:?}",
                    self.ride
                );
                let max_speed = if bedrock { 1.0 } else { 0.98 };
                ensure_check!(input.forward.abs() <= max_speed, "illegal speed (f): {}", input.forward);
                ensure_check!(input.sideways.abs() <= max_speed, "illegal speed (s): {}", input.sideways);
                if version < ProtocolVersion::V1_21_2 {
                    self.on_input(state)?;
                }
            }
            Serverbound::SetPlayerPositionRotation(p) => {
                if !self.ride.in_vehicle() && self.ride != Ride::Waiting {
                    return self.on_movement(state, p.y, p.flags.on_ground);
                }
            }
            Serverbound::SetPlayerPosition(p) => {
                if !self.ride.in_vehicle() && self.ride != Ride::Waiting {
                    return self.on_movement(state, p.y, p.flags.on_ground);
                }
            }
            _ => {}
        }
        Ok(Step::Stay)
    }

    fn on_movement(&mut self, state: &mut SessionState, y: f64, on_ground: bool) -> Result<Step> {
        ensure_check!(!on_ground, "invalid ground state: {}", y);
        let in_air_y = state.ctx.world.in_air_y as f64;
        ensure_check!(y <= in_air_y, "illegal y position: {}", y);
        if self.ride == Ride::InAirAfterBoat {
            self.mount(state, Ride::InMinecart);
            return Ok(Step::Stay);
        }
        Ok(Step::Done)
    }

    fn on_input(&mut self, state: &mut SessionState) -> Result<()> {
        let bedrock = state.profile.bedrock;
        // Bedrock clients never send rotations while riding
        if bedrock {
            self.rotations += 1;
        } else {
            ensure_check!(
                self.rotations >= self.inputs,
                "illegal packet order; r/i {}/{}",
                self.rotations,
                self.inputs
            );
        }
        // no paddles before 1.9, and minecarts neither paddle nor move
        if state.version() < ProtocolVersion::V1_9 || self.ride == Ride::InMinecart {
            self.paddles += 1;
            self.moves += 1;
        } else if !bedrock {
            ensure_check!(
                self.paddles >= self.inputs,
                "illegal packet order; i/p {}/{}",
                self.inputs,
                self.paddles
            );
            ensure_check!(
                self.moves >= self.inputs,
                "illegal packet order; i/v {}/{}",
                self.inputs,
                self.moves
            );
        }
        self.inputs += 1;

        let minimum = state.ctx.config.vehicle.minimum_packets;
        if self.inputs > minimum
            && self.rotations > minimum
            && self.paddles > minimum
            && self.moves > minimum
        {
            let vehicle = state.ctx.world.vehicle_entity_id;
            state.send(Clientbound::RemoveEntities(RemoveEntities {
                entity_ids: vec![vehicle],
            }));
            let next = if self.ride == Ride::InBoat {
                Ride::InAirAfterBoat
            } else {
                Ride::InAirAfterMinecart
            };
            self.prepare(state, next);
        }
        Ok(())
    }
}
