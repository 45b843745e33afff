//! libusb backend for [`FrameLink`] and [`EventPump`].

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::os::raw::{c_int, c_uint};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::error;
use rusb::{DeviceHandle, UsbContext};

extern crate libusb1_sys as usbffi;
use libusb1_sys::constants::*;

use super::{EventPump, FrameLink, TransferEvent, TransferKind};
use crate::error::{CompletionStatus, TransportError};
use crate::protocol::header::{ImageHeader, IMAGE_HEADER_SIZE};
use crate::protocol::{EP_IMG_OUT, FRAME_SIZE, TIMEOUT_MS};

/// What a completion callback needs, reached through the transfer's
/// `user_data`. Lives on the heap for the lifetime of the link.
struct Completion {
    kind: TransferKind,
    events: Sender<TransferEvent>,
    outstanding: Arc<AtomicUsize>,
}

extern "system" fn transfer_finished(transfer_ptr: *mut usbffi::libusb_transfer) {
    let transfer: &mut usbffi::libusb_transfer = unsafe { &mut *transfer_ptr };

    let user_data = transfer.user_data as *const Completion;
    if user_data.is_null() {
        return;
    }
    let completion = unsafe { &*user_data };

    let outcome = match transfer.status {
        LIBUSB_TRANSFER_COMPLETED => Ok(()),
        status => Err(TransportError::Completion {
            transfer: completion.kind,
            status: completion_status(status),
        }),
    };

    completion.outstanding.fetch_sub(1, Ordering::AcqRel);

    // the receiving session may already be gone during teardown
    let _ = completion.events.send(TransferEvent {
        kind: completion.kind,
        outcome,
    });
}

fn completion_status(status: c_int) -> CompletionStatus {
    match status {
        LIBUSB_TRANSFER_ERROR => CompletionStatus::Error,
        LIBUSB_TRANSFER_TIMED_OUT => CompletionStatus::TimedOut,
        LIBUSB_TRANSFER_CANCELLED => CompletionStatus::Cancelled,
        LIBUSB_TRANSFER_STALL => CompletionStatus::Stall,
        LIBUSB_TRANSFER_NO_DEVICE => CompletionStatus::NoDevice,
        LIBUSB_TRANSFER_OVERFLOW => CompletionStatus::Overflow,
        other => CompletionStatus::Unknown(other),
    }
}

/// Header and payload transfers of one projector, bound to its handle and
/// its frame buffer for as long as the link exists.
///
/// The buffers are only written while no transfer is outstanding. If the
/// link is dropped with transfers still outstanding, descriptors and buffers
/// are leaked and the handle is left open rather than freed under the
/// hardware.
pub struct UsbFrameLink<T: UsbContext> {
    header_transfer: *mut usbffi::libusb_transfer,
    payload_transfer: *mut usbffi::libusb_transfer,
    header_completion: *mut Completion,
    payload_completion: *mut Completion,
    header: Vec<u8>,
    frame: Vec<u8>,
    outstanding: Arc<AtomicUsize>,
    // closed after the transfers are freed, never while one is pending
    handle: ManuallyDrop<DeviceHandle<T>>,
}

impl<T: UsbContext> UsbFrameLink<T> {
    pub fn new(
        handle: DeviceHandle<T>,
        events: Sender<TransferEvent>,
    ) -> Result<Self, TransportError> {
        let header_transfer = unsafe { usbffi::libusb_alloc_transfer(0) };
        if header_transfer.is_null() {
            return Err(TransportError::Alloc);
        }
        let payload_transfer = unsafe { usbffi::libusb_alloc_transfer(0) };
        if payload_transfer.is_null() {
            unsafe { usbffi::libusb_free_transfer(header_transfer) };
            return Err(TransportError::Alloc);
        }

        let outstanding = Arc::new(AtomicUsize::new(0));
        let header_completion = Box::into_raw(Box::new(Completion {
            kind: TransferKind::Header,
            events: events.clone(),
            outstanding: outstanding.clone(),
        }));
        let payload_completion = Box::into_raw(Box::new(Completion {
            kind: TransferKind::Payload,
            events,
            outstanding: outstanding.clone(),
        }));

        let mut link = Self {
            header_transfer,
            payload_transfer,
            header_completion,
            payload_completion,
            header: ImageHeader::full_frame().encode().to_vec(),
            frame: vec![0u8; FRAME_SIZE],
            outstanding,
            handle: ManuallyDrop::new(handle),
        };

        unsafe {
            usbffi::libusb_fill_bulk_transfer(
                link.header_transfer,
                link.handle.as_raw(),
                EP_IMG_OUT,
                link.header.as_mut_ptr(),
                IMAGE_HEADER_SIZE as c_int,
                transfer_finished as _,
                link.header_completion as *mut c_void,
                TIMEOUT_MS as c_uint,
            );
            (*link.header_transfer).flags = LIBUSB_TRANSFER_SHORT_NOT_OK as u8;

            usbffi::libusb_fill_bulk_transfer(
                link.payload_transfer,
                link.handle.as_raw(),
                EP_IMG_OUT,
                link.frame.as_mut_ptr(),
                FRAME_SIZE as c_int,
                transfer_finished as _,
                link.payload_completion as *mut c_void,
                TIMEOUT_MS as c_uint,
            );
            (*link.payload_transfer).flags = LIBUSB_TRANSFER_SHORT_NOT_OK as u8;
        }

        Ok(link)
    }

    /// Transfers submitted whose callback has not run yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn submit(
        &mut self,
        transfer: *mut usbffi::libusb_transfer,
        kind: TransferKind,
    ) -> Result<(), TransportError> {
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let code = unsafe { usbffi::libusb_submit_transfer(transfer) };
        if code < 0 {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            error!("USB error submitting {} transfer: {}", kind, code);
            return Err(TransportError::Submit {
                transfer: kind,
                code,
            });
        }
        Ok(())
    }
}

impl<T: UsbContext> FrameLink for UsbFrameLink<T> {
    fn frame_mut(&mut self) -> &mut [u8] {
        &mut self.frame
    }

    fn submit_header(&mut self) -> Result<(), TransportError> {
        self.submit(self.header_transfer, TransferKind::Header)
    }

    fn submit_payload(&mut self) -> Result<(), TransportError> {
        self.submit(self.payload_transfer, TransferKind::Payload)
    }
}

impl<T: UsbContext> Drop for UsbFrameLink<T> {
    fn drop(&mut self) {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            error!(
                "releasing link with {} transfers in flight, leaking its buffers",
                outstanding
            );
            std::mem::forget(std::mem::take(&mut self.header));
            std::mem::forget(std::mem::take(&mut self.frame));
            return;
        }

        unsafe {
            usbffi::libusb_free_transfer(self.header_transfer);
            usbffi::libusb_free_transfer(self.payload_transfer);
            drop(Box::from_raw(self.header_completion));
            drop(Box::from_raw(self.payload_completion));
            ManuallyDrop::drop(&mut self.handle);
        }
    }
}

/// One `libusb_handle_events_timeout` pass over a whole context.
pub struct UsbEvents<T: UsbContext> {
    context: T,
    timeout: libc::timeval,
}

impl<T: UsbContext> UsbEvents<T> {
    pub fn new(context: T) -> Self {
        Self {
            context,
            timeout: libc::timeval {
                tv_sec: 1,
                tv_usec: 0,
            },
        }
    }
}

impl<T: UsbContext> EventPump for UsbEvents<T> {
    fn pump(&self) -> Result<(), TransportError> {
        let code = unsafe {
            usbffi::libusb_handle_events_timeout(
                self.context.as_raw(),
                &self.timeout as *const libc::timeval,
            )
        };
        if code < 0 {
            error!("USB error handling events: {}", code);
            return Err(TransportError::EventLoop(code));
        }
        Ok(())
    }
}
