// Serial port interface (16550 UART)

use core::fmt;

pub struct SerialPort {
    inner: uart_16550::SerialPort,
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_str(s)
    }
}

impl SerialPort {
    #[allow(dead_code)]
    pub fn from_inner(inner: uart_16550::SerialPort) -> Self {
        Self { inner }
    }
}

// Serial print macros for testing
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_serial_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => {
        $crate::serial_print!("{}\n", format_args!($($arg)*))
    };
}

#[doc(hidden)]
pub fn _serial_print(args: fmt::Arguments) {
    use core::fmt::Write;

    use uart_16550::SerialPort;
    use x86_64::instructions::interrupts;

    interrupts::without_interrupts(|| {
        let mut port = unsafe { SerialPort::new(0x3F8) };
        port.write_fmt(args).unwrap();
    });
}
