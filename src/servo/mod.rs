use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::{
    conn::Transport,
    proto::{
        cmd::{MoveTo, Ping, ReadPosition, SetPositionLimits, SetTorqueEnable},
        pack_cmd,
        reply::{decode_position, find_status, ReplyLayout, StatusPacket},
        Command, Packet, ServoId,
    },
    util::scale::ServoScale,
    Error, Result,
};

/// Time the servo gets to answer before the reply is collected.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Servos this controller drives; commands for any other id are skipped.
    pub ports: Vec<ServoId>,
    pub reply_layout: ReplyLayout,
    pub settle: Duration,
    pub scale: ServoScale,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            ports: Vec::new(),
            reply_layout: ReplyLayout::default(),
            settle: DEFAULT_SETTLE,
            scale: ServoScale::default(),
        }
    }
}

impl ControllerConfig {
    pub fn new(
        ports: Vec<ServoId>,
        reply_layout: Option<ReplyLayout>,
        settle: Option<Duration>,
        scale: Option<ServoScale>,
    ) -> Self {
        ControllerConfig {
            ports,
            reply_layout: reply_layout.unwrap_or_default(),
            settle: settle.unwrap_or(DEFAULT_SETTLE),
            scale: scale.unwrap_or_default(),
        }
    }
}

/// Drives the servos of one bus through a [`Transport`].
pub struct Controller<T: Transport> {
    transport: T,
    config: ControllerConfig,
}

impl<T: Transport> Controller<T> {
    pub fn new(transport: T, config: ControllerConfig) -> Self {
        Controller { transport, config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    #[inline]
    pub fn is_configured(&self, id: ServoId) -> bool {
        self.config.ports.contains(&id)
    }

    fn ensure_configured(&self, id: ServoId) -> Result<()> {
        if !self.is_configured(id) {
            return Err(Error::NotConfigured(id.get()));
        }

        Ok(())
    }

    /// Transmits raw bytes. An empty buffer means there is nothing this protocol can send.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::Unsupported("no frame to transmit".into()));
        }

        trace!(len = data.len(), "transmit");
        self.transport.send(data).map_err(From::from)
    }

    pub fn send_cmd<C: Command>(&mut self, cmd: &C) -> Result<Packet> {
        let packet = pack_cmd(cmd)?;
        self.send(packet.as_bytes())?;
        Ok(packet)
    }

    /// Packs every command with a configured id and transmits them in one go.
    fn send_batch<C, I>(&mut self, cmds: I) -> Result<usize>
    where
        C: Command,
        I: IntoIterator<Item = C>,
    {
        let mut data = Vec::new();
        let mut count = 0;
        for cmd in cmds {
            if !self.is_configured(cmd.id()) {
                trace!(id = cmd.id().get(), "skip unconfigured servo");
                continue;
            }

            data.extend(pack_cmd(&cmd)?.into_vec());
            count += 1;
        }

        if count == 0 {
            return Ok(0);
        }

        self.send(&data)?;
        Ok(count)
    }

    fn collect_reply(&mut self) -> Result<Vec<u8>> {
        if !self.config.settle.is_zero() {
            std::thread::sleep(self.config.settle);
        }

        let reply = self.transport.recv_available()?;
        trace!(len = reply.len(), "reply collected");
        Ok(reply)
    }

    /// Sends a ping and waits for the servo's status.
    pub fn ping(&mut self, id: ServoId) -> Result<StatusPacket> {
        self.transport.discard_input()?;
        let request = self.send_cmd(&Ping::new(id))?;
        let reply = self.collect_reply()?;
        find_status(&reply, &request)
    }

    pub fn set_torque(&mut self, id: ServoId, on: bool) -> Result<()> {
        self.ensure_configured(id)?;
        self.send_cmd(&SetTorqueEnable { id, on })?;
        Ok(())
    }

    /// Turns the torque off on every configured servo among `ids`.
    pub fn release(&mut self, ids: &[ServoId]) -> Result<usize> {
        let count = self.send_batch(ids.iter().map(|&id| SetTorqueEnable { id, on: false }))?;
        debug!(count, "released servos");
        Ok(count)
    }

    /// Moves one servo to a position on the logical scale.
    pub fn move_to(&mut self, id: ServoId, position: i32) -> Result<()> {
        self.ensure_configured(id)?;
        self.send_cmd(&MoveTo::new(id, self.config.scale.to_bus(position)))?;
        Ok(())
    }

    /// Moves several servos in a single transmission, positions on the logical scale.
    pub fn move_many(&mut self, moves: &[(ServoId, i32)]) -> Result<usize> {
        let scale = self.config.scale;
        let count = self.send_batch(
            moves
                .iter()
                .map(|&(id, position)| MoveTo::new(id, scale.to_bus(position))),
        )?;
        trace!(count, requested = moves.len(), "moved servos");
        Ok(count)
    }

    /// Moves one servo to a bus position, skipping the logical scale.
    pub fn set_position_raw(&mut self, id: ServoId, position: i32) -> Result<()> {
        self.send_cmd(&MoveTo::new(id, position))?;
        Ok(())
    }

    pub fn set_position_limits(&mut self, id: ServoId, min: i32, max: i32) -> Result<()> {
        self.ensure_configured(id)?;
        self.send_cmd(&SetPositionLimits { id, min, max })?;
        Ok(())
    }

    /// Reads the present position of a servo, on the logical scale.
    pub fn read_position(&mut self, id: ServoId) -> Result<i32> {
        self.ensure_configured(id)?;

        self.transport.discard_input()?;
        let request = self.send_cmd(&ReadPosition::new(id))?;
        let reply = self.collect_reply()?;

        let layout = self.config.reply_layout;
        let raw = decode_position(layout, &reply, &request).map_err(|e| {
            warn!(id = id.get(), %layout, len = reply.len(), "read position: {}", e);
            e
        })?;

        let position = self.config.scale.from_reply(raw.0);
        debug!(id = id.get(), raw = raw.0, position, "position read");
        Ok(position)
    }
}
