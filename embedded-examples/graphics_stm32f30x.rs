//! Full example code for driving an SSD1306 display from a tick loop. This runs on an STM32F303RE,
//! using a 128x64 SSD1306 I2C module connected to I2C1 (PB6 SCL, PB7 SDA).

#![deny(unsafe_code)]
#![no_main]
#![no_std]

extern crate cortex_m;
extern crate embedded_hal as hal_api;
extern crate stm32f30x;
extern crate stm32f30x_hal as hal;
#[macro_use]
extern crate cortex_m_rt;
extern crate panic_abort;
extern crate ssd1306_polled;

use cortex_m::asm;
use cortex_m_rt::ExceptionFrame;
use hal::i2c::I2c;
use hal::prelude::*;
use hal_api::blocking::delay::DelayMs;
use ssd1306_polled as oled;
use ssd1306_polled::graphics::GraphicsState;

entry!(main);

exception!(*, default_handler);
exception!(HardFault, hard_fault);

fn hard_fault(_ef: &ExceptionFrame) -> ! {
    asm::bkpt();
    loop {}
}

fn default_handler(_irqn: i16) {
    loop {}
}

/// 8x8 arrow, one byte per column, least significant bit at the top.
const ARROW: [u8; 8] = [0x18, 0x18, 0x18, 0x18, 0xFF, 0x7E, 0x3C, 0x18];

fn main() -> ! {
    // Get peripherals and set up RCC.
    let cp = cortex_m::Peripherals::take().unwrap();
    let dp = stm32f30x::Peripherals::take().unwrap();

    let mut flash = dp.FLASH.constrain();
    let mut rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.freeze(&mut flash.acr);
    let mut delay = hal::delay::Delay::new(cp.SYST, clocks);

    // I2C1 is Alternate Function 4 for GPIOs PB6,7.
    let mut gpiob = dp.GPIOB.split(&mut rcc.ahb);
    let scl = gpiob.pb6.into_af4(&mut gpiob.moder, &mut gpiob.afrl);
    let sda = gpiob.pb7.into_af4(&mut gpiob.moder, &mut gpiob.afrl);
    let i2c = I2c::i2c1(dp.I2C1, (scl, sda), 400.khz(), clocks, &mut rcc.apb1);

    // The module used here has no external VCC, so the internal charge pump stays enabled. The
    // startup delay is counted in ticks of the loop below.
    let config = oled::Config::default().contrast(0xCF).startup_delay_ticks(100);
    let mut gfx = oled::Graphics::new(oled::BlockingI2c::new(i2c), 0, config);

    // Move the arrow across the panel, one column per frame.
    let mut x: i16 = -8;
    loop {
        gfx.run();

        if gfx.state() == GraphicsState::Error {
            gfx.reset();
        }

        if let Some(fb) = gfx.framebuffer_mut() {
            fb.init();
            fb.blit(x, 28, 8, 8, &ARROW);
            x = if x >= oled::consts::NUM_PIXEL_COLS as i16 { -8 } else { x + 1 };
            gfx.show();
        }

        // One scheduler tick.
        delay.delay_ms(1_u16);
    }
}
