//! Wire-level message framing for the lock protocol.
//!
//! Every frame is `[length][type][command hi][command lo][encrypted][payload...]`
//! where the length byte counts the whole frame including itself. The command
//! is a big-endian 16-bit value whose high byte selects a namespace and whose
//! low byte selects an operation within it.

/// Shortest possible frame: length, type, two command bytes, encrypted flag.
const HEADER_LEN: usize = 5;

/// Largest payload that still fits the one-byte length prefix.
const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - HEADER_LEN;

/// The role a message plays in the exchange.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A message requesting data or an action.
    Request = 0x01,
    /// A direct answer to a request.
    Reply = 0x02,
    /// An unsolicited push from the peripheral.
    Notification = 0x03,
}

impl MessageType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Reply),
            0x03 => Some(Self::Notification),
            _ => None,
        }
    }
}

/// A command understood by the peripheral.
///
/// The high byte is the namespace, the low byte the operation:
/// `0x01` device settings, `0x02` wifi network, `0x03` key exchange and
/// encryption, `0x04` normal usage, `0x05` guest usage.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCommand {
    SetName = 0x0101,
    GetName = 0x0102,
    SetAutoLock = 0x0103,
    GetAutoLock = 0x0104,
    SetUserId = 0x0105,
    Reset = 0x0106,

    StartNetworkListen = 0x0201,
    StopNetworkListen = 0x0202,
    NetworkSsidUpdate = 0x0203,
    ConnectToNetwork = 0x0204,

    KeyExchange = 0x0301,
    SetDevicePassword = 0x0302,

    GetLockState = 0x0401,
    SetLockState = 0x0402,

    GuestUnlock = 0x0501,
}

impl MessageCommand {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0101 => Some(Self::SetName),
            0x0102 => Some(Self::GetName),
            0x0103 => Some(Self::SetAutoLock),
            0x0104 => Some(Self::GetAutoLock),
            0x0105 => Some(Self::SetUserId),
            0x0106 => Some(Self::Reset),
            0x0201 => Some(Self::StartNetworkListen),
            0x0202 => Some(Self::StopNetworkListen),
            0x0203 => Some(Self::NetworkSsidUpdate),
            0x0204 => Some(Self::ConnectToNetwork),
            0x0301 => Some(Self::KeyExchange),
            0x0302 => Some(Self::SetDevicePassword),
            0x0401 => Some(Self::GetLockState),
            0x0402 => Some(Self::SetLockState),
            0x0501 => Some(Self::GuestUnlock),
            _ => None,
        }
    }
}

/// A single protocol exchange unit, either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// What role the message plays.
    pub message_type: MessageType,
    /// Which command the message carries.
    pub command: MessageCommand,
    /// Whether the payload is AEAD-sealed.
    pub encrypted: bool,
    /// The contents of the message. `None` means no payload bytes were on the
    /// wire at all, which is distinct from an empty payload.
    pub payload: Option<Vec<u8>>,
}

impl Message {
    /// Builds an unencrypted request, the most common shape.
    pub fn request(command: MessageCommand) -> Self {
        Self {
            message_type: MessageType::Request,
            command,
            encrypted: false,
            payload: None,
        }
    }

    /// Builds an unencrypted request carrying a payload.
    pub fn request_with(command: MessageCommand, payload: Vec<u8>) -> Self {
        Self {
            message_type: MessageType::Request,
            command,
            encrypted: false,
            payload: Some(payload),
        }
    }

    /// Builds a request flagged as carrying an encrypted payload.
    pub fn encrypted_request(command: MessageCommand, payload: Vec<u8>) -> Self {
        Self {
            message_type: MessageType::Request,
            command,
            encrypted: true,
            payload: Some(payload),
        }
    }

    /// Packs the message into its wire frame.
    ///
    /// Returns `None` when the payload is too large for the one-byte length
    /// prefix; such a message can never form a valid frame.
    pub fn pack(&self) -> Option<Vec<u8>> {
        let payload_len = self.payload.as_ref().map_or(0, Vec::len);
        if payload_len > MAX_PAYLOAD_LEN {
            return None;
        }
        let total = HEADER_LEN + payload_len;
        let mut frame = Vec::with_capacity(total);
        frame.push(total as u8);
        frame.push(self.message_type as u8);
        frame.extend_from_slice(&(self.command as u16).to_be_bytes());
        frame.push(u8::from(self.encrypted));
        if let Some(payload) = &self.payload {
            frame.extend_from_slice(payload);
        }
        Some(frame)
    }

    /// Unpacks a message from a wire frame.
    ///
    /// Returns `None` for frames shorter than five bytes, for a length prefix
    /// that disagrees with the buffer, or for an unknown type or command.
    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN || data[0] as usize != data.len() {
            return None;
        }
        let message_type = MessageType::from_u8(data[1])?;
        let command = MessageCommand::from_u16(u16::from_be_bytes([data[2], data[3]]))?;
        let encrypted = data[4] != 0x00;
        let payload = if data.len() > HEADER_LEN {
            Some(data[HEADER_LEN..].to_vec())
        } else {
            None
        };
        Some(Self {
            message_type,
            command,
            encrypted,
            payload,
        })
    }
}
