use std::io::{Read, Write};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rusb::{Device, DeviceHandle, Direction, GlobalContext, RequestType, Recipient, TransferType};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::pipe::{Pipe, PipeReader};
use crate::traits::{Transport, TransportKind};

const VID_GOOGLE: u16 = 0x18d1;
const PID_ACCESSORY: u16 = 0x2d00;
const PID_ACCESSORY_ADB: u16 = 0x2d01;

// AOA control requests.
const ACC_REQ_GET_PROTOCOL: u8 = 51;
const ACC_REQ_SEND_STRING: u8 = 52;
const ACC_REQ_START: u8 = 53;

// AOA identity string indices and the values Android Auto expects.
const ACC_IDX_MANUFACTURER: u16 = 0;
const ACC_IDX_MODEL: u16 = 1;
const ACC_IDX_DESCRIPTION: u16 = 2;
const ACC_IDX_VERSION: u16 = 3;
const ACC_IDX_URI: u16 = 4;
const ACC_IDX_SERIAL: u16 = 5;

const ACC_STRINGS: [(u16, &str); 6] = [
    (ACC_IDX_MANUFACTURER, "Android"),
    (ACC_IDX_MODEL, "Android Auto"),
    (ACC_IDX_DESCRIPTION, "Android Auto"),
    (ACC_IDX_VERSION, "1.0"),
    (ACC_IDX_URI, "http://www.android.com/"),
    (ACC_IDX_SERIAL, "HU-AAAAAA001"),
];

const CTRL_TIMEOUT: Duration = Duration::from_secs(1);
const PUMP_READ_TIMEOUT: Duration = Duration::from_millis(150);
const PUMP_BUF_SIZE: usize = 16 * 1024;
const WAIT_FOR_DEVICE_GRACE: Duration = Duration::from_secs(30);
const ENUM_RETRY_DELAY: Duration = Duration::from_millis(500);

/// USB accessory transport.
///
/// `start` switches an attached Android device into accessory mode (AOA),
/// claims the accessory interface, and spawns a pump thread that copies
/// bulk-IN data into a pipe. The pipe's read end is the pollable
/// descriptor the connection core coalesces with its wake pipe; the pump
/// closing its end of the pipe is the EOF that signals device loss.
pub struct UsbTransport {
    handle: Option<Arc<DeviceHandle<GlobalContext>>>,
    out_ep: u8,
    reader: Option<PipeReader>,
    pump: Option<JoinHandle<()>>,
    quit: Arc<AtomicBool>,
}

impl UsbTransport {
    pub fn new() -> Self {
        Self {
            handle: None,
            out_ep: 0,
            reader: None,
            pump: None,
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    fn find_accessory() -> Result<Option<Device<GlobalContext>>> {
        for device in rusb::devices()?.iter() {
            let desc = device.device_descriptor()?;
            if desc.vendor_id() == VID_GOOGLE
                && matches!(desc.product_id(), PID_ACCESSORY | PID_ACCESSORY_ADB)
            {
                return Ok(Some(device));
            }
        }
        Ok(None)
    }

    /// Ask every attached device to switch into accessory mode. Devices
    /// that answer the AOA protocol probe re-enumerate as VID_GOOGLE
    /// accessories a moment later.
    fn request_accessory_mode() -> Result<()> {
        for device in rusb::devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if desc.vendor_id() == VID_GOOGLE
                && matches!(desc.product_id(), PID_ACCESSORY | PID_ACCESSORY_ADB)
            {
                continue;
            }
            let handle = match device.open() {
                Ok(h) => h,
                Err(_) => continue,
            };

            let mut proto = [0u8; 2];
            let in_vendor = rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device);
            let out_vendor =
                rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);
            let n = match handle.read_control(
                in_vendor,
                ACC_REQ_GET_PROTOCOL,
                0,
                0,
                &mut proto,
                CTRL_TIMEOUT,
            ) {
                Ok(n) => n,
                Err(_) => continue,
            };
            if n < 2 || u16::from_le_bytes(proto) == 0 {
                continue;
            }

            debug!(
                vendor = desc.vendor_id(),
                product = desc.product_id(),
                "switching device to accessory mode"
            );
            for (index, value) in ACC_STRINGS {
                handle.write_control(
                    out_vendor,
                    ACC_REQ_SEND_STRING,
                    0,
                    index,
                    value.as_bytes(),
                    CTRL_TIMEOUT,
                )?;
            }
            handle.write_control(out_vendor, ACC_REQ_START, 0, 0, &[], CTRL_TIMEOUT)?;
        }
        Ok(())
    }

    fn bulk_endpoints(device: &Device<GlobalContext>) -> Result<(u8, u8)> {
        let config = device.active_config_descriptor()?;
        let mut in_ep = None;
        let mut out_ep = None;
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                for ep in desc.endpoint_descriptors() {
                    if ep.transfer_type() != TransferType::Bulk {
                        continue;
                    }
                    match ep.direction() {
                        Direction::In if in_ep.is_none() => in_ep = Some(ep.address()),
                        Direction::Out if out_ep.is_none() => out_ep = Some(ep.address()),
                        _ => {}
                    }
                }
                if in_ep.is_some() && out_ep.is_some() {
                    return Ok((in_ep.unwrap_or_default(), out_ep.unwrap_or_default()));
                }
            }
        }
        Err(TransportError::NoDevice)
    }
}

impl Default for UsbTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UsbTransport {
    fn start(&mut self, wait_for_device: bool) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        // Switched devices take a moment to re-enumerate, so even without
        // wait_for_device a short grace period applies.
        let grace = if wait_for_device {
            WAIT_FOR_DEVICE_GRACE
        } else {
            Duration::from_secs(3)
        };
        let deadline = Instant::now() + grace;
        let device = loop {
            if let Some(device) = Self::find_accessory()? {
                break device;
            }
            Self::request_accessory_mode()?;
            if Instant::now() >= deadline {
                return Err(TransportError::NoDevice);
            }
            std::thread::sleep(ENUM_RETRY_DELAY);
        };

        let (in_ep, out_ep) = Self::bulk_endpoints(&device)?;
        let mut handle = device.open()?;
        let _ = handle.set_auto_detach_kernel_driver(true);
        handle.claim_interface(0)?;
        info!(in_ep, out_ep, "usb accessory claimed");

        let handle = Arc::new(handle);
        let (reader, mut writer) = Pipe::new()?.into_parts();
        self.quit.store(false, Ordering::SeqCst);

        let pump_handle = Arc::clone(&handle);
        let quit = Arc::clone(&self.quit);
        let pump = std::thread::Builder::new()
            .name("hu-usb-pump".into())
            .spawn(move || {
                let mut buf = vec![0u8; PUMP_BUF_SIZE];
                while !quit.load(Ordering::SeqCst) {
                    match pump_handle.read_bulk(in_ep, &mut buf, PUMP_READ_TIMEOUT) {
                        Ok(0) => continue,
                        Ok(n) => {
                            if writer.write_all(&buf[..n]).is_err() {
                                break;
                            }
                        }
                        Err(rusb::Error::Timeout) => continue,
                        Err(err) => {
                            warn!(%err, "usb bulk read failed, closing stream");
                            break;
                        }
                    }
                }
                // Dropping the writer delivers EOF to the poll loop.
            })
            .map_err(std::io::Error::from)?;

        self.handle = Some(handle);
        self.out_ep = out_ep;
        self.reader = Some(reader);
        self.pump = Some(pump);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.quit.store(true, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
        if let Some(handle) = self.handle.take() {
            // The pump is joined, so this is the last reference.
            if let Ok(mut handle) = Arc::try_unwrap(handle) {
                let _ = handle.release_interface(0);
            }
        }
        self.reader = None;
        Ok(())
    }

    fn write(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        let handle = self.handle.as_ref().ok_or(TransportError::NotStarted)?;
        match handle.write_bulk(self.out_ep, buf, timeout) {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Err(TransportError::Timeout),
            Err(err) => Err(TransportError::Usb(err)),
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or(TransportError::NotStarted)?;
        let events = crate::poll::poll_readable(&[reader.as_raw_fd()], Some(timeout))?;
        if !events[0].readable && !events[0].hangup {
            return Err(TransportError::Timeout);
        }
        match reader.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn read_fd(&self) -> Option<RawFd> {
        self.reader.as_ref().map(|r| r.as_raw_fd())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Usb
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
