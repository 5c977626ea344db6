/// Write one log line to the debug port, best-effort
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::serial::uart1::log(format_args!($($arg)*))
    };
}

/// An IRQ driven, transmit-only serial port for logs and the sample dump
///
/// Output never blocks. Text that does not fit into the transmit queue is
/// dropped a whole line at a time.
pub mod uart1 {
    use core::fmt::Write;

    use crate::interrupt;
    use crate::hal::{
        pac,
        prelude::*,
        serial::{
            Event,
            Serial,
        }
    };
    use heapless::spsc::{Consumer, Producer, Queue};
    use heapless::String;
    use scan::debug_text::{Busy, TextSink};
    use stm32f0xx_hal::gpio::{
        gpiob,
        Alternate,
        AF0,
    };

    const TX_Q_SIZE: usize = 256;
    const LOG_LINE_LEN: usize = 80;

    static mut TX_Q_CONSUMER: Option<Consumer<u8, TX_Q_SIZE>> = None;
    static mut TX_Q_PRODUCER: Option<Producer<u8, TX_Q_SIZE>> = None;

    type TxPinType = gpiob::PB6<Alternate<AF0>>;
    type RxPinType = gpiob::PB7<Alternate<AF0>>;
    static mut SERIAL: Option<Serial<pac::USART1, TxPinType, RxPinType>> = None;

    pub struct Uart1Tx {}

    impl core::fmt::Write for Uart1Tx {
        fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
            try_write_str(s).map_err(|_| core::fmt::Error)
        }
    }

    impl TextSink for Uart1Tx {
        fn try_send(&mut self, text: &str) -> Result<(), Busy> {
            try_write_str(text)
        }
    }

    /// Must be called once during application initialization
    pub fn init(serial: Serial<pac::USART1, TxPinType, RxPinType>, irq_prio: u8) {
        let core = unsafe { pac::CorePeripherals::steal() };
        let mut nvic = core.NVIC;

        static mut TX_Q: Queue<u8, TX_Q_SIZE> = Queue::new();

        let (tx_q_producer, tx_q_consumer) = unsafe { TX_Q.split() };

        unsafe {
            TX_Q_PRODUCER = Some(tx_q_producer);
            TX_Q_CONSUMER = Some(tx_q_consumer);
            SERIAL = Some(serial);

            nvic.set_priority(pac::Interrupt::USART1, irq_prio);
            pac::NVIC::unmask(pac::Interrupt::USART1);
        }
    }

    /// Queue all of `s` for transmission, or none of it if there is no room
    pub fn try_write_str(s: &str) -> Result<(), Busy> {
        let tx_q_producer = unsafe { TX_Q_PRODUCER.as_mut().ok_or(Busy)? };
        if tx_q_producer.capacity() - tx_q_producer.len() < s.len() {
            return Err(Busy);
        }
        for b in s.bytes() {
            // Cannot fail, room was checked above and only the IRQ dequeues
            let _ = tx_q_producer.enqueue(b);
        }
        let serial = unsafe { SERIAL.as_mut().unwrap_unchecked() };
        serial.listen(Event::Txe);
        Ok(())
    }

    /// Format and queue one line, terminated with CR LF
    pub fn log(args: core::fmt::Arguments) {
        let mut line: String<LOG_LINE_LEN> = String::new();
        if line.write_fmt(args).is_err() || line.push_str("\r\n").is_err() {
            return;
        }
        try_write_str(&line).ok();
    }

    pub fn writer() -> Uart1Tx {
        Uart1Tx {}
    }

    #[interrupt]
    fn USART1() {
        let serial = unsafe{ SERIAL.as_mut().unwrap_unchecked() };
        let tx_q_consumer = unsafe { TX_Q_CONSUMER.as_mut().unwrap_unchecked() };
        let usart1 = unsafe { crate::hal::pac::Peripherals::steal().USART1 };

        // Check if there is room to transmit a byte
        let isr = (*usart1).isr.read();
        if isr.txe().bit_is_set() {
            match tx_q_consumer.dequeue() {
                Some(b) => {
                    serial.write(b).ok();
                },
                None => {
                    // Queue empty: mask TXE until the next write re-enables it
                    serial.unlisten(Event::Txe);
                }
            }
        }
    }

}
