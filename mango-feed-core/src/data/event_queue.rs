//! EventQueue ring-buffer decoding
//!
//! The queue is a 256-slot ring of 200-byte event records. `head` and
//! `count` delimit the unconsumed range; `seq_num` counts every event ever
//! pushed and is what consumers use to find the newly appended ones.

use crate::core::errors::DecodeError;
use crate::core::fixed::I80F48;
use crate::core::pubkey::PublicKey;
use crate::core::types::Side;
use crate::data::layout::{event_type, EVENT_QUEUE_HEADER_SIZE, EVENT_QUEUE_SIZE, EVENT_SIZE, MAX_EVENTS};
use crate::data::reader::ByteReader;
use crate::data::{AccountLayout, MetaData};

/// A trade between a resting maker order and an incoming taker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillEvent {
    pub taker_side: Side,
    pub maker_slot: u8,
    /// Maker order was fully filled and left the book
    pub maker_out: bool,
    pub version: u8,
    pub timestamp: u64,
    pub seq_num: u64,
    pub maker: PublicKey,
    pub maker_order_id: i128,
    pub maker_client_order_id: u64,
    pub maker_fee: I80F48,
    pub best_initial: i64,
    pub maker_timestamp: u64,
    pub taker: PublicKey,
    pub taker_order_id: i128,
    pub taker_client_order_id: u64,
    pub taker_fee: I80F48,
    /// Native price in quote lots per base lot
    pub price: i64,
    /// Base lots
    pub quantity: i64,
}

impl FillEvent {
    /// Seconds the maker order rested before this fill
    pub fn time_on_book(&self) -> u64 {
        self.timestamp.saturating_sub(self.maker_timestamp)
    }

    /// Maker side is always the opposite of the taker
    pub fn maker_side(&self) -> Side {
        self.taker_side.opposite()
    }
}

/// An order removed from the book without trading (cancel, expiry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutEvent {
    pub side: Side,
    pub owner_slot: u8,
    pub timestamp: u64,
    pub seq_num: u64,
    pub owner: PublicKey,
    pub quantity: i64,
}

/// Position transfer from a liquidated account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidateEvent {
    pub timestamp: u64,
    pub seq_num: u64,
    pub liqee: PublicKey,
    pub liqor: PublicKey,
    pub price: I80F48,
    pub quantity: i64,
    pub liquidation_fee: I80F48,
}

/// One ring slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Fill(FillEvent),
    Out(OutEvent),
    Liquidate(LiquidateEvent),
    /// Type byte outside the known set, or a side byte that is not 0/1
    Unknown(u8),
}

impl Event {
    /// Decode one 200-byte slot
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let tag = r.read_u8()?;
        match tag {
            event_type::FILL => read_fill(r),
            event_type::OUT => read_out(r),
            event_type::LIQUIDATE => read_liquidate(r),
            other => Ok(Event::Unknown(other)),
        }
    }

    pub fn seq_num(&self) -> Option<u64> {
        match self {
            Event::Fill(e) => Some(e.seq_num),
            Event::Out(e) => Some(e.seq_num),
            Event::Liquidate(e) => Some(e.seq_num),
            Event::Unknown(_) => None,
        }
    }

    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Event::Fill(e) => Some(e.timestamp),
            Event::Out(e) => Some(e.timestamp),
            Event::Liquidate(e) => Some(e.timestamp),
            Event::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Fill(_) => "fill",
            Event::Out(_) => "out",
            Event::Liquidate(_) => "liquidate",
            Event::Unknown(_) => "unknown",
        }
    }
}

fn read_fill(r: &mut ByteReader<'_>) -> Result<Event, DecodeError> {
    let side = r.read_u8()?;
    let Some(taker_side) = Side::from_u8(side) else {
        return Ok(Event::Unknown(event_type::FILL));
    };
    let maker_slot = r.read_u8()?;
    let maker_out = r.read_bool()?;
    let version = r.read_u8()?;
    r.skip(3)?;

    Ok(Event::Fill(FillEvent {
        taker_side,
        maker_slot,
        maker_out,
        version,
        timestamp: r.read_u64()?,
        seq_num: r.read_u64()?,
        maker: r.read_pubkey()?,
        maker_order_id: r.read_i128()?,
        maker_client_order_id: r.read_u64()?,
        maker_fee: r.read_i80f48()?,
        best_initial: r.read_i64()?,
        maker_timestamp: r.read_u64()?,
        taker: r.read_pubkey()?,
        taker_order_id: r.read_i128()?,
        taker_client_order_id: r.read_u64()?,
        taker_fee: r.read_i80f48()?,
        price: r.read_i64()?,
        quantity: r.read_i64()?,
    }))
}

fn read_out(r: &mut ByteReader<'_>) -> Result<Event, DecodeError> {
    let side = r.read_u8()?;
    let Some(side) = Side::from_u8(side) else {
        return Ok(Event::Unknown(event_type::OUT));
    };
    let owner_slot = r.read_u8()?;
    r.skip(5)?;

    Ok(Event::Out(OutEvent {
        side,
        owner_slot,
        timestamp: r.read_u64()?,
        seq_num: r.read_u64()?,
        owner: r.read_pubkey()?,
        quantity: r.read_i64()?,
    }))
}

fn read_liquidate(r: &mut ByteReader<'_>) -> Result<Event, DecodeError> {
    r.skip(7)?;

    Ok(Event::Liquidate(LiquidateEvent {
        timestamp: r.read_u64()?,
        seq_num: r.read_u64()?,
        liqee: r.read_pubkey()?,
        liqor: r.read_pubkey()?,
        price: r.read_i80f48()?,
        quantity: r.read_i64()?,
        liquidation_fee: r.read_i80f48()?,
    }))
}

/// Decoded event queue snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQueue {
    pub meta: MetaData,
    /// Slot of the oldest unconsumed event
    pub head: u64,
    /// Number of unconsumed events
    pub count: u64,
    /// Total events ever pushed
    pub seq_num: u64,
    pub events: Box<[Event]>,
}

impl EventQueue {
    /// Slot the next event will be written to
    #[inline]
    pub fn next_slot(&self) -> usize {
        (self.head.wrapping_add(self.count) % MAX_EVENTS as u64) as usize
    }

    #[inline]
    pub fn event(&self, slot: usize) -> Option<&Event> {
        self.events.get(slot)
    }

    /// Unconsumed events in ring order, oldest first
    pub fn unconsumed(&self) -> impl Iterator<Item = &Event> + '_ {
        let head = (self.head % MAX_EVENTS as u64) as usize;
        let count = self.count.min(MAX_EVENTS as u64) as usize;
        (0..count).filter_map(move |i| self.events.get((head + i) % MAX_EVENTS))
    }
}

impl AccountLayout for EventQueue {
    const KIND: &'static str = "EventQueue";
    const SIZE: usize = EVENT_QUEUE_SIZE;

    fn read_fields(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let meta = MetaData::read(r)?;
        let head = r.read_u64()?;
        let count = r.read_u64()?;
        let seq_num = r.read_u64()?;

        let mut events = Vec::with_capacity(MAX_EVENTS);
        for i in 0..MAX_EVENTS {
            let mut slot = r.window(EVENT_QUEUE_HEADER_SIZE + i * EVENT_SIZE, EVENT_SIZE)?;
            events.push(Event::read(&mut slot)?);
        }

        Ok(Self {
            meta,
            head,
            count,
            seq_num,
            events: events.into_boxed_slice(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{
        encode_event, fill_event, fixture_event_queue, FIXTURE_FILL_EVENT_BASE64, FIXTURE_MAKER,
        FIXTURE_TAKER,
    };

    #[test]
    fn test_fixture_fill_decodes() {
        let raw = crate::codec::base64_decode(FIXTURE_FILL_EVENT_BASE64).unwrap();
        assert_eq!(raw.len(), EVENT_SIZE);

        let event = Event::read(&mut ByteReader::new(&raw)).unwrap();
        let Event::Fill(fill) = event else {
            panic!("Expected Fill, got {:?}", event);
        };

        assert_eq!(fill.taker_side, Side::Sell);
        assert_eq!(fill.maker_slot, 12);
        assert!(!fill.maker_out);
        assert_eq!(fill.timestamp, 1_644_182_650);
        assert_eq!(fill.seq_num, 208_787);
        assert_eq!(fill.maker.to_base58(), FIXTURE_MAKER);
        assert_eq!(fill.maker_order_id, 7_671_244_543_748_780_405_054_196);
        assert_eq!(fill.maker_client_order_id, 1_644_182_622_524);
        assert_eq!((fill.maker_fee.to_f64() * 10_000.0).round(), -4.0);
        assert_eq!(fill.best_initial, 0);
        assert_eq!(fill.maker_timestamp, 1_644_182_623);
        assert_eq!(fill.taker.to_base58(), FIXTURE_TAKER);
        assert_eq!(fill.taker_order_id, 7_484_028_538_144_702_206_551_329);
        assert_eq!(fill.taker_client_order_id, 0);
        assert_eq!((fill.taker_fee.to_f64() * 10_000.0).round(), 5.0);
        assert_eq!(fill.price, 415_858);
        assert_eq!(fill.quantity, 1);
        assert_eq!(fill.time_on_book(), 27);
        assert_eq!(fill.maker_side(), Side::Buy);
    }

    #[test]
    fn test_fixture_queue_header() {
        let queue = fixture_event_queue();
        assert_eq!(queue.seq_num, 208_787);
        assert_eq!(queue.head, 0);
        assert_eq!(queue.count, 1);
        assert_eq!(queue.next_slot(), 1);
        assert_eq!(queue.unconsumed().count(), 1);
    }

    #[test]
    fn test_out_and_liquidate_roundtrip_through_layout() {
        let out = Event::Out(OutEvent {
            side: Side::Sell,
            owner_slot: 3,
            timestamp: 55,
            seq_num: 9,
            owner: PublicKey::new([4; 32]),
            quantity: 17,
        });
        let liq = Event::Liquidate(LiquidateEvent {
            timestamp: 66,
            seq_num: 10,
            liqee: PublicKey::new([5; 32]),
            liqor: PublicKey::new([6; 32]),
            price: I80F48::from_int(41),
            quantity: -3,
            liquidation_fee: I80F48::from_bits(1 << 40),
        });

        for event in [out, liq] {
            let bytes = encode_event(&event);
            assert_eq!(Event::read(&mut ByteReader::new(&bytes)).unwrap(), event);
        }
    }

    #[test]
    fn test_unknown_type_byte() {
        let mut bytes = [0u8; EVENT_SIZE];
        bytes[0] = 9;
        assert_eq!(
            Event::read(&mut ByteReader::new(&bytes)).unwrap(),
            Event::Unknown(9)
        );
    }

    #[test]
    fn test_invalid_side_is_unknown() {
        let mut bytes = encode_event(&Event::Fill(fill_event(1, 100, 1)));
        bytes[1] = 7;
        assert_eq!(
            Event::read(&mut ByteReader::new(&bytes)).unwrap(),
            Event::Unknown(event_type::FILL)
        );
    }

    #[test]
    fn test_event_accessors() {
        let event = Event::Fill(fill_event(42, 100, 1));
        assert_eq!(event.seq_num(), Some(42));
        assert_eq!(event.kind(), "fill");
        assert_eq!(Event::Unknown(5).timestamp(), None);
    }
}
