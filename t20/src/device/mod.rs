pub mod init;

use std::sync::mpsc;

use log::{debug, error, info, warn};
use rusb::{Device, DeviceHandle, UsbContext};
use simple_error::SimpleError;

use crate::protocol::registers::Registers;
use crate::protocol::{PRODUCT_ID, VENDOR_ID};
use crate::session::DeviceSession;
use crate::transfer::usb::{UsbEvents, UsbFrameLink};

pub use init::InitOptions;

pub type UsbSession<T> = DeviceSession<UsbFrameLink<T>, UsbEvents<T>>;

/// Open and claim every T20 on the bus.
///
/// A device that cannot be opened, configured or claimed is logged and
/// skipped; the scan carries on with the next one.
pub fn find_all<T: UsbContext>(context: &T) -> Result<Vec<DeviceHandle<T>>, SimpleError> {
    let devices = context
        .devices()
        .map_err(|e| SimpleError::with("could not list USB devices", e))?;

    let mut handles = Vec::new();
    for device in devices.iter() {
        let device_desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => continue,
        };

        if device_desc.vendor_id() != VENDOR_ID || device_desc.product_id() != PRODUCT_ID {
            continue;
        }

        info!(
            "Found device on bus {} device {}.",
            device.bus_number(),
            device.address()
        );

        match open_device(&device) {
            Ok(handle) => handles.push(handle),
            Err(err) => warn!("{}", err),
        }
    }

    Ok(handles)
}

fn open_device<T: UsbContext>(device: &Device<T>) -> Result<DeviceHandle<T>, SimpleError> {
    let mut handle = device
        .open()
        .map_err(|e| SimpleError::with("USB error open()", e))?;

    handle
        .set_active_configuration(1)
        .map_err(|e| SimpleError::with("USB error set_configuration()", e))?;

    handle
        .claim_interface(0)
        .map_err(|e| SimpleError::with("USB error claim_interface()", e))?;

    Ok(handle)
}

/// Run the init sequence on a claimed handle and bind it to a streaming
/// session on `context`'s event loop.
pub fn open_session<T: UsbContext>(
    context: &T,
    label: String,
    mut handle: DeviceHandle<T>,
    options: &InitOptions,
) -> crate::Result<UsbSession<T>> {
    debug!("{}: init", label);
    init::run(&mut Registers::new(&mut handle), options)?;

    let (tx, rx) = mpsc::channel();
    let link = UsbFrameLink::new(handle, tx)?;
    Ok(DeviceSession::new(label, link, rx, UsbEvents::new(context.clone())))
}

/// Find, initialize and open every projector.
///
/// Fails only if no device at all could be brought up.
pub fn connect_all<T: UsbContext>(
    context: &T,
    options: &InitOptions,
) -> Result<Vec<UsbSession<T>>, SimpleError> {
    let mut sessions = Vec::new();

    for (index, handle) in find_all(context)?.into_iter().enumerate() {
        let label = format!("t20#{}", index);
        match open_session(context, label.clone(), handle, options) {
            Ok(session) => sessions.push(session),
            Err(err) => error!("{}: setup failed: {}", label, err),
        }
    }

    if sessions.is_empty() {
        return Err(SimpleError::new("could not find any device"));
    }
    Ok(sessions)
}
