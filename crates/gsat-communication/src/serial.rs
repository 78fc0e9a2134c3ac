//! Serial port access
//!
//! Provides the low-level seams the worker talks through:
//! - `SerialLink`, an open device handle
//! - `PortOpener`, which turns a port name and baud rate into a link
//! - `SystemPortOpener`, the `serialport` backed implementation
//! - Port enumeration for controller discovery
//!
//! Framing is fixed at 8 data bits, no parity, one stop bit and no flow
//! control, with a 1ms read timeout.

use gsat_core::ConnectionError;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Read poll timeout; no read blocks longer than this
pub const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// An open serial device
pub trait SerialLink: Send {
    /// Number of bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read into `buf`, returning the number of bytes read
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data` to the device
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Whether the device still reports itself open
    fn is_open(&self) -> bool {
        true
    }

    /// Port name
    fn name(&self) -> &str;
}

/// Opens serial links.
///
/// Implementations apply whatever platform adjustments are needed for a
/// freshly opened descriptor to behave reliably across reconnects.
pub trait PortOpener: Send {
    /// Open `port` at `baud_rate` with the fixed 8N1 framing
    fn open(&mut self, port: &str, baud_rate: u32)
        -> Result<Box<dyn SerialLink>, ConnectionError>;
}

/// Production opener backed by the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl SystemPortOpener {
    /// Create a new opener
    pub fn new() -> Self {
        Self
    }
}

impl PortOpener for SystemPortOpener {
    fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
    ) -> Result<Box<dyn SerialLink>, ConnectionError> {
        let path = device_path(port);
        let builder = serialport::new(&path, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None);

        let native = builder.open_native().map_err(|e| {
            tracing::warn!("Failed to open serial port {}: {}", path, e);
            map_open_error(port, e)
        })?;

        // Without raw mode, reopening after a failed session can report
        // success while never receiving data.
        #[cfg(unix)]
        {
            apply_raw_mode(&native).map_err(|e| ConnectionError::open_failure(port, e))?;
        }

        Ok(Box::new(SystemLink {
            port: Box::new(native),
            name: port.to_string(),
        }))
    }
}

/// Serial link over a `serialport` handle; dropping it closes the device
struct SystemLink {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialLink for SystemLink {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|count| count as usize)
            .map_err(io::Error::from)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.port, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, data)?;
        self.port.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Map a `serialport` open error onto the connection error taxonomy
fn map_open_error(port: &str, err: serialport::Error) -> ConnectionError {
    match err.kind {
        serialport::ErrorKind::Unknown => ConnectionError::unexpected(err.description),
        _ => ConnectionError::open_failure(port, err.description),
    }
}

/// Device path for a port name
#[cfg(windows)]
fn device_path(port: &str) -> String {
    if port.starts_with(r"\\.\") {
        port.to_string()
    } else {
        format!(r"\\.\{}", port)
    }
}

/// Device path for a port name
#[cfg(not(windows))]
fn device_path(port: &str) -> String {
    port.to_string()
}

/// Put the descriptor into raw (non-canonical, non-echoing) mode
#[cfg(unix)]
fn apply_raw_mode(port: &serialport::TTYPort) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = port.as_raw_fd();
    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();

    // SAFETY: `fd` is owned by `port` and open for the duration of this call,
    // and `termios` is only read after tcgetattr has filled it in.
    unsafe {
        if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut termios = termios.assume_init();
        libc::cfmakeraw(&mut termios);
        if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Arduino Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor and product IDs if applicable
    pub usb_ids: Option<(u16, u16)>,
}

/// List the serial ports that look like attached controllers
///
/// Matches the usual device names:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn available_ports() -> Result<Vec<SerialPortInfo>, ConnectionError> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::unexpected(format!("Failed to enumerate ports: {}", e))
    })?;

    Ok(ports
        .into_iter()
        .filter(|port| is_controller_port(&port.port_name))
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => SerialPortInfo {
                description: format!(
                    "USB {} {}",
                    usb.manufacturer.as_deref().unwrap_or("Device"),
                    usb.product.as_deref().unwrap_or("Serial Port")
                ),
                manufacturer: usb.manufacturer,
                usb_ids: Some((usb.vid, usb.pid)),
                port_name: port.port_name,
            },
            serialport::SerialPortType::BluetoothPort => SerialPortInfo {
                port_name: port.port_name,
                description: "Bluetooth Serial".to_string(),
                manufacturer: None,
                usb_ids: None,
            },
            _ => SerialPortInfo {
                port_name: port.port_name,
                description: "Serial Port".to_string(),
                manufacturer: None,
                usb_ids: None,
            },
        })
        .collect())
}

/// Check if a port name matches the device patterns controllers show up as
pub fn is_controller_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}
