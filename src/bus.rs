//! Wires RAM and the four memory-mapped chips onto the address spaces the
//! CPU actually touches: a 16-bit memory bus (`Storage`, delegating to
//! `Ram`) and an 8-bit I/O bus (`memory::io::IoBus`).
//!
//! The PIC also needs to be driven directly by the CPU core between
//! instructions (`Bus::pic_update`), not only through its I/O ports, so it
//! -- and the other three chips, for the simulator façade's device pokes --
//! are held in `Rc<RefCell<_>>` and mounted on the I/O bus through a
//! `Shared` adapter. Plain `Rc`/`RefCell` rather than an `Arc`/`Mutex` pair
//! is deliberate: §5's concurrency model is single-threaded cooperative, so
//! there is never a second thread to guard against.

use std::cell::RefCell;
use std::rc::Rc;

use crate::handshake::Handshake;
use crate::memory::io::{Access, IoBus, IoPort};
use crate::memory::{DataInit, Ram, Storage};
use crate::pic::Pic;
use crate::pio::Pio;
use crate::timer::Timer;
use crate::value::Byte;

struct Shared<T>(Rc<RefCell<T>>);

impl<T: IoPort> IoPort for Shared<T> {
    fn read(&mut self, port: u8) -> Byte {
        self.0.borrow_mut().read(port)
    }

    fn write(&mut self, port: u8, value: Byte) {
        self.0.borrow_mut().write(port, value)
    }
}

pub struct Bus {
    pub ram: Ram,
    io: IoBus,
    pub pic: Rc<RefCell<Pic>>,
    pub pio: Rc<RefCell<Pio>>,
    pub timer: Rc<RefCell<Timer>>,
    pub handshake: Rc<RefCell<Handshake>>,
}

impl Bus {
    pub fn new(init: DataInit) -> Bus {
        let pic = Rc::new(RefCell::new(Pic::new()));
        let pio = Rc::new(RefCell::new(Pio::new()));
        let timer = Rc::new(RefCell::new(Timer::new()));
        let handshake = Rc::new(RefCell::new(Handshake::new()));

        let mut io = IoBus::new();
        io.mount(0x10, 0x06, "pic", Box::new(Shared(pic.clone())));
        io.mount(0x20, 0x03, "timer", Box::new(Shared(timer.clone())));
        io.mount(0x30, 0x04, "pio", Box::new(Shared(pio.clone())));
        io.mount(0x40, 0x02, "handshake", Box::new(Shared(handshake.clone())));

        Bus {
            ram: Ram::new(init),
            io,
            pic,
            pio,
            timer,
            handshake,
        }
    }

    pub fn io_read(&mut self, port: u8) -> Access {
        self.io.read(port)
    }

    pub fn io_write(&mut self, port: u8, value: Byte) -> bool {
        self.io.write(port, value)
    }

    pub fn pic_update(&mut self, interrupt_flag: bool) -> crate::pic::Update {
        self.pic.borrow_mut().update(interrupt_flag)
    }
}

impl Storage for Bus {
    fn read_byte(&self, address: u16) -> Option<Byte> {
        self.ram.read_byte(address)
    }

    fn write_byte(&mut self, address: u16, value: Byte) -> bool {
        self.ram.write_byte(address, value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Word;

    #[test]
    fn io_routes_through_shared_pic() {
        let mut bus = Bus::new(DataInit::Clean);
        assert_eq!(bus.io_write(0x10, Byte::new(0x00)), true); // IMR = 0
        bus.pic.borrow_mut().set_vector(0, 0x40);
        bus.pic.borrow_mut().request(0);
        assert!(matches!(
            bus.pic_update(true),
            crate::pic::Update::Dispatch { .. }
        ));
    }

    #[test]
    fn memory_and_io_are_independent_address_spaces() {
        let mut bus = Bus::new(DataInit::Clean);
        bus.write_word(0x10, Word::new(0x1234));
        assert_eq!(bus.read_word(0x10), Some(Word::new(0x1234)));
        // Port 0x10 (PIC's IMR) is untouched by the memory write above.
        assert_eq!(bus.io_read(0x10), Access::Mapped(Byte::new(0xFF)));
    }
}
