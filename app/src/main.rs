#![no_main]
#![no_std]

use core::sync::atomic::{AtomicU32, Ordering};
use cortex_m_rt::{entry, exception};
use panic_halt as _;

use stm32f0xx_hal as hal;

use scan::adc::{Adc, SampleTime};
use scan::bridge::NotificationBridge;
use scan::conversion::ConversionEngine;
use scan::debug_text;
use scan::gpio::PortPins;
use scan::pins::{Pin, PinController, Port};
use scan::sequencer::{Progress, ScanState, Sequencer};
use scan::signal::Flag;
use scan::{Error, ScanConfig, CHANNELS};

use crate::hal::pac;
use crate::hal::pac::interrupt;
use crate::hal::prelude::*;

#[macro_use]
mod serial;
mod converter;
mod link;
mod tick_timer;

/// Drive pin for each logical channel
static CHANNEL_MAP: [Pin; CHANNELS] = [
    Pin::new(Port::B, 3),
    Pin::new(Port::B, 4),
    Pin::new(Port::B, 5),
    Pin::new(Port::B, 8),
    Pin::new(Port::B, 9),
    Pin::new(Port::B, 10),
];

/// ADC_IN0, IN1 and IN4..IN7 on PA0, PA1 and PA4..PA7
const ADC_CHANNELS: u32 = (1 << 0) | (1 << 1) | (1 << 4) | (1 << 5) | (1 << 6) | (1 << 7);

static SCAN_CONFIG: ScanConfig = ScanConfig {
    conversion_timeout_ms: 100,
    debug_text: false,
};

const TICK_FREQ: u32 = 1;
const BAUD: u32 = 115_200;

// Cortex-M0 implements only the top two priority bits
const ADC_PRIO: u8 = 0x40;
const TICK_PRIO: u8 = 0x80;
const UART_PRIO: u8 = 0xC0;

/// Milliseconds since boot, advanced by SysTick
static TIME: AtomicU32 = AtomicU32::new(0);
static TICK: Flag = Flag::new();

/// Unrecoverable init error: mask interrupts and park the core
fn fatal() -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::nop();
    }
}

#[entry]
fn main() -> ! {
    let (Some(dp), Some(cp)) = (pac::Peripherals::take(), cortex_m::Peripherals::take()) else {
        fatal();
    };
    let mut nvic = cp.NVIC;

    let mut flash = dp.FLASH;
    let mut rcc = dp.RCC.configure().sysclk(48.mhz()).freeze(&mut flash);
    let gpioa = dp.GPIOA.split(&mut rcc);
    // Also enables the port clock for the drive pins, which PortPins switches at runtime
    let gpiob = dp.GPIOB.split(&mut rcc);

    // The HAL only wants the critical section for AF register writes during init
    let fake_cs = unsafe { cortex_m::interrupt::CriticalSection::new() };

    let tx_pin = gpiob.pb6.into_alternate_af0(&fake_cs);
    let rx_pin = gpiob.pb7.into_alternate_af0(&fake_cs);
    let uart = hal::serial::Serial::usart1(dp.USART1, (tx_pin, rx_pin), BAUD.bps(), &mut rcc);
    serial::uart1::init(uart, UART_PRIO);

    info!("touchdetect {}", env!("CARGO_PKG_VERSION"));

    let peer_tx = gpioa.pa2.into_alternate_af1(&fake_cs);
    let peer_rx = gpioa.pa3.into_alternate_af1(&fake_cs);
    let peer = hal::serial::Serial::usart2(dp.USART2, (peer_tx, peer_rx), BAUD.bps(), &mut rcc);
    let mut link = link::PeerLink::new(peer);

    // Sense inputs
    let _in0 = gpioa.pa0.into_analog(&fake_cs);
    let _in1 = gpioa.pa1.into_analog(&fake_cs);
    let _in4 = gpioa.pa4.into_analog(&fake_cs);
    let _in5 = gpioa.pa5.into_analog(&fake_cs);
    let _in6 = gpioa.pa6.into_analog(&fake_cs);
    let _in7 = gpioa.pa7.into_analog(&fake_cs);

    let adc = converter::init(Adc::new(ADC_CHANNELS, SampleTime::T239_5));

    let pins = PinController::new(PortPins::new(), CHANNEL_MAP);
    let mut sequencer = Sequencer::new(pins, ConversionEngine::new(adc), Some(&SCAN_CONFIG));
    if sequencer.calibrate().is_err() {
        fatal();
    }
    info!("adc calibrated");

    let mut bridge = NotificationBridge::new();
    let mut debug = serial::uart1::writer();

    let mut tick_timer = tick_timer::TickTimer::new(dp.TIM2, &mut rcc, TICK_FREQ);
    tick_timer.listen();

    let mut syst = hal::timers::Timer::syst(cp.SYST, 1000.hz(), &mut rcc);
    syst.listen(&hal::timers::Event::TimeOut);

    unsafe {
        nvic.set_priority(pac::Interrupt::ADC_COMP, ADC_PRIO);
        nvic.set_priority(pac::Interrupt::TIM2, TICK_PRIO);
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::ADC_COMP);
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM2);
    }

    // Latched from the link until the next tick consumes it
    let mut peer_request = false;

    loop {
        let now = TIME.load(Ordering::Relaxed);

        let received = link.poll();
        peer_request |= received.data_request;
        if let Some(e) = received.error {
            info!("link: {:?}", e);
        }

        // Results first, so a cycle never starts with an older result still waiting
        while let Some(result) = sequencer.take_result() {
            let channel = match sequencer.state() {
                ScanState::Scanning(channel) => Some(channel),
                _ => None,
            };
            match sequencer.on_conversion(result, now) {
                Ok(Progress::Complete { .. }) => {
                    bridge.on_scan_complete(sequencer.buffer());
                }
                Ok(Progress::Advanced { .. }) => {}
                Err(e) => info!("conversion: {:?}", e),
            }
            if SCAN_CONFIG.debug_text {
                if let Some(channel) = channel {
                    debug_text::emit(&mut debug, channel, &result);
                }
            }
        }

        if TICK.take() {
            if bridge.on_tick(peer_request) {
                sequencer.request();
            } else {
                sequencer.cancel_request();
            }
            peer_request = false;

            match sequencer.on_tick(now) {
                Ok(_) => {}
                // Reported when the fault was raised
                Err(Error::Faulted) => {}
                Err(e) => info!("tick: {:?}", e),
            }
        }

        if let Err(e) = sequencer.poll(now) {
            info!("fault: {:?}", e);
            sequencer.reset();
        }

        if let Err(e) = bridge.run(&mut link) {
            info!("send: {:?}, {} dropped", e, bridge.dropped());
        }
    }
}

#[exception]
fn SysTick() {
    let time = TIME.load(Ordering::Relaxed);
    TIME.store(time.wrapping_add(1), Ordering::Relaxed);
}

#[interrupt]
fn TIM2() {
    // Clear IRQ flags
    unsafe {
        let tim2 = pac::Peripherals::steal().TIM2;
        tim2.sr.write(|w| w.bits(0));
    }
    TICK.raise();
}
