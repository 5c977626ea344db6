//! Runtime pin mode switching for STM32F0 GPIO ports
//!
//! The HAL encodes pin modes in the type system, which does not fit pins that
//! change between analog and output on every scan step. This writes the mode
//! registers directly. Port clocks must already be enabled.

use stm32f0::stm32f0x1 as pac;

use crate::pins::{Pin, PinDriver, Port};

const MODE_OUTPUT: u32 = 0b01;
const MODE_ANALOG: u32 = 0b11;
const SPEED_LOW: u32 = 0b00;
const PULL_NONE: u32 = 0b00;

macro_rules! with_port {
    ($port:expr, $gpio:ident => $body:expr) => {
        match $port {
            Port::A => {
                let $gpio = unsafe { &*pac::GPIOA::ptr() };
                $body
            }
            Port::B => {
                let $gpio = unsafe { &*pac::GPIOB::ptr() };
                $body
            }
            Port::C => {
                let $gpio = unsafe { &*pac::GPIOC::ptr() };
                $body
            }
        }
    };
}

/// Replace the two-bit field for `pin` in a mode style register value
fn field2(bits: u32, pin: Pin, value: u32) -> u32 {
    let shift = pin.index as u32 * 2;
    (bits & !(0b11 << shift)) | (value << shift)
}

pub struct PortPins;

impl PortPins {
    pub fn new() -> Self {
        Self
    }
}

impl PinDriver for PortPins {
    fn set_output(&mut self, pin: Pin) {
        with_port!(pin.port, gpio => {
            gpio.otyper.modify(|r, w| unsafe { w.bits(r.bits() & !(1 << pin.index)) });
            gpio.ospeedr.modify(|r, w| unsafe { w.bits(field2(r.bits(), pin, SPEED_LOW)) });
            gpio.pupdr.modify(|r, w| unsafe { w.bits(field2(r.bits(), pin, PULL_NONE)) });
            gpio.moder.modify(|r, w| unsafe { w.bits(field2(r.bits(), pin, MODE_OUTPUT)) });
        })
    }

    fn set_analog(&mut self, pin: Pin) {
        with_port!(pin.port, gpio => {
            gpio.moder.modify(|r, w| unsafe { w.bits(field2(r.bits(), pin, MODE_ANALOG)) });
            gpio.pupdr.modify(|r, w| unsafe { w.bits(field2(r.bits(), pin, PULL_NONE)) });
        })
    }

    fn set_high(&mut self, pin: Pin) {
        with_port!(pin.port, gpio => {
            gpio.bsrr.write(|w| unsafe { w.bits(1 << pin.index) });
        })
    }

    fn set_low(&mut self, pin: Pin) {
        with_port!(pin.port, gpio => {
            gpio.bsrr.write(|w| unsafe { w.bits(1 << (pin.index as u32 + 16)) });
        })
    }
}
