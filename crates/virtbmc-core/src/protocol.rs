//! Management request dispatch.
//!
//! Requests arrive as `(netfn, command, data)` triples. Session handling and
//! the outer packet format live behind [`FrameCodec`]; this module only knows
//! how to turn a decoded request into calls on a [`Bmc`].

use crate::bmc::Bmc;
use crate::codes::{BootDevice, CompletionCode, PowerState};

/// Network function codes.
pub mod netfn {
    /// Chassis commands.
    pub const CHASSIS: u8 = 0x00;
    /// Application commands.
    pub const APP: u8 = 0x06;
}

/// Command codes, grouped by network function.
pub mod cmd {
    /// Get Device ID (app).
    pub const GET_DEVICE_ID: u8 = 0x01;
    /// Cold Reset (app).
    pub const COLD_RESET: u8 = 0x02;
    /// Activate Payload (app).
    pub const ACTIVATE_PAYLOAD: u8 = 0x48;
    /// Deactivate Payload (app).
    pub const DEACTIVATE_PAYLOAD: u8 = 0x49;
    /// Get Chassis Status (chassis).
    pub const GET_CHASSIS_STATUS: u8 = 0x01;
    /// Chassis Control (chassis).
    pub const CHASSIS_CONTROL: u8 = 0x02;
    /// Set System Boot Options (chassis).
    pub const SET_SYSTEM_BOOT_OPTIONS: u8 = 0x08;
    /// Get System Boot Options (chassis).
    pub const GET_SYSTEM_BOOT_OPTIONS: u8 = 0x09;
}

/// Chassis control sub-commands.
mod control {
    pub const POWER_DOWN: u8 = 0x00;
    pub const POWER_UP: u8 = 0x01;
    pub const POWER_CYCLE: u8 = 0x02;
    pub const HARD_RESET: u8 = 0x03;
    pub const SOFT_SHUTDOWN: u8 = 0x05;
}

/// Boot options parameter carrying the boot flags.
const BOOT_FLAGS_PARAMETER: u8 = 0x05;

/// A decoded management request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Network function.
    pub netfn: u8,
    /// Command within the network function.
    pub command: u8,
    /// Request data bytes.
    pub data: Vec<u8>,
}

impl Request {
    /// Build a request.
    #[must_use]
    pub fn new(netfn: u8, command: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            netfn,
            command,
            data: data.into(),
        }
    }
}

/// A management response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Outcome.
    pub code: CompletionCode,
    /// Response data bytes following the completion code.
    pub data: Vec<u8>,
}

impl Response {
    /// A response with no data.
    #[must_use]
    pub const fn code(code: CompletionCode) -> Self {
        Self {
            code,
            data: Vec::new(),
        }
    }

    /// A successful response carrying data.
    #[must_use]
    pub const fn ok(data: Vec<u8>) -> Self {
        Self {
            code: CompletionCode::Success,
            data,
        }
    }
}

/// Turns datagrams into requests and responses into datagrams.
pub trait FrameCodec: Send + Sync {
    /// Decode a datagram. `None` drops it silently.
    fn decode(&self, frame: &[u8]) -> Option<Request>;

    /// Encode the response to `request`.
    fn encode(&self, request: &Request, response: &Response) -> Vec<u8>;
}

/// Bare payload framing without session wrapping.
///
/// A request is `[netfn, command, data..]`; a response is
/// `[netfn | 1, command, completion code, data..]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadCodec;

impl FrameCodec for PayloadCodec {
    fn decode(&self, frame: &[u8]) -> Option<Request> {
        match frame {
            [netfn, command, data @ ..] => Some(Request::new(*netfn, *command, data)),
            _ => None,
        }
    }

    fn encode(&self, request: &Request, response: &Response) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + response.data.len());
        out.push(request.netfn | 1);
        out.push(request.command);
        out.push(response.code.as_u8());
        out.extend_from_slice(&response.data);
        out
    }
}

/// Run one request against a variant.
pub async fn dispatch(bmc: &dyn Bmc, request: &Request) -> Response {
    match (request.netfn, request.command) {
        (netfn::APP, cmd::GET_DEVICE_ID) => Response::ok(device_id()),
        (netfn::APP, cmd::COLD_RESET) => Response::code(bmc.cold_reset().await),
        (netfn::APP, cmd::ACTIVATE_PAYLOAD) => bmc.activate_payload(&request.data).await,
        (netfn::APP, cmd::DEACTIVATE_PAYLOAD) => bmc.deactivate_payload(&request.data).await,
        (netfn::CHASSIS, cmd::GET_CHASSIS_STATUS) => chassis_status(bmc).await,
        (netfn::CHASSIS, cmd::CHASSIS_CONTROL) => chassis_control(bmc, &request.data).await,
        (netfn::CHASSIS, cmd::GET_SYSTEM_BOOT_OPTIONS) => {
            get_boot_options(bmc, &request.data).await
        }
        (netfn::CHASSIS, cmd::SET_SYSTEM_BOOT_OPTIONS) => {
            set_boot_options(bmc, &request.data).await
        }
        (netfn, command) => {
            tracing::debug!(
                bmc = %bmc.name(),
                netfn = netfn,
                command = command,
                "Unsupported command"
            );
            Response::code(CompletionCode::InvalidCommand)
        }
    }
}

fn device_id() -> Vec<u8> {
    // device id, revision, firmware 0.0, IPMI 2.0, no extras, manufacturer and product zero
    vec![0x00, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
}

async fn chassis_status(bmc: &dyn Bmc) -> Response {
    match bmc.power_state().await {
        Ok(state) => Response::ok(vec![u8::from(state == PowerState::On), 0x00, 0x00]),
        Err(e) => {
            tracing::warn!(bmc = %bmc.name(), error = %e, "Failed to read power state");
            Response::code(CompletionCode::UnspecifiedError)
        }
    }
}

async fn chassis_control(bmc: &dyn Bmc, data: &[u8]) -> Response {
    let Some(&selector) = data.first() else {
        return Response::code(CompletionCode::RequestDataLengthInvalid);
    };

    let code = match selector & 0x0f {
        control::POWER_DOWN => bmc.power_off().await,
        control::POWER_UP => bmc.power_on().await,
        control::POWER_CYCLE => bmc.power_cycle().await,
        control::HARD_RESET => bmc.power_reset().await,
        control::SOFT_SHUTDOWN => bmc.power_shutdown().await,
        _ => CompletionCode::InvalidDataFieldInRequest,
    };
    Response::code(code)
}

async fn get_boot_options(bmc: &dyn Bmc, data: &[u8]) -> Response {
    let Some(&parameter) = data.first() else {
        return Response::code(CompletionCode::RequestDataLengthInvalid);
    };
    if parameter & 0x7f != BOOT_FLAGS_PARAMETER {
        return Response::code(CompletionCode::ParameterOutOfRange);
    }

    match bmc.boot_device().await {
        Ok(device) => {
            let valid = if device == BootDevice::Default { 0x00 } else { 0x80 };
            Response::ok(vec![
                0x01,
                BOOT_FLAGS_PARAMETER,
                valid,
                device.selector(),
                0x00,
                0x00,
                0x00,
            ])
        }
        Err(e) => {
            tracing::warn!(bmc = %bmc.name(), error = %e, "Failed to read boot device");
            Response::code(CompletionCode::UnspecifiedError)
        }
    }
}

async fn set_boot_options(bmc: &dyn Bmc, data: &[u8]) -> Response {
    let Some(&parameter) = data.first() else {
        return Response::code(CompletionCode::RequestDataLengthInvalid);
    };
    if parameter & 0x7f != BOOT_FLAGS_PARAMETER {
        // set-in-progress and the other bookkeeping parameters are acknowledged
        return Response::code(CompletionCode::Success);
    }

    let Some(&flags) = data.get(2) else {
        return Response::code(CompletionCode::RequestDataLengthInvalid);
    };
    match BootDevice::from_selector(flags) {
        Some(device) => Response::code(bmc.set_boot_device(device).await),
        None => Response::code(CompletionCode::InvalidDataFieldInRequest),
    }
}
