//! PerpMarket account decoding
//!
//! The market account names the bids, asks and event-queue accounts a feed
//! needs to subscribe to, and carries the lot sizes used to turn native
//! prices and quantities into UI units.

use crate::core::errors::DecodeError;
use crate::core::fixed::I80F48;
use crate::core::pubkey::PublicKey;
use crate::data::layout::PERP_MARKET_SIZE;
use crate::data::reader::ByteReader;
use crate::data::{AccountLayout, MetaData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityMiningInfo {
    pub rate: I80F48,
    pub max_depth_bps: I80F48,
    pub period_start: u64,
    pub target_period_length: u64,
    pub mngo_left: u64,
    pub mngo_per_period: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerpMarket {
    pub meta: MetaData,
    pub mango_group: PublicKey,
    pub bids: PublicKey,
    pub asks: PublicKey,
    pub event_queue: PublicKey,
    pub quote_lot_size: i64,
    pub base_lot_size: i64,
    pub long_funding: I80F48,
    pub short_funding: I80F48,
    pub open_interest: i64,
    pub last_updated: u64,
    pub seq_num: u64,
    pub fees_accrued: I80F48,
    pub liquidity_mining_info: LiquidityMiningInfo,
    pub mngo_vault: PublicKey,
}

impl AccountLayout for PerpMarket {
    const KIND: &'static str = "PerpMarket";
    const SIZE: usize = PERP_MARKET_SIZE;

    fn read_fields(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            meta: MetaData::read(r)?,
            mango_group: r.read_pubkey()?,
            bids: r.read_pubkey()?,
            asks: r.read_pubkey()?,
            event_queue: r.read_pubkey()?,
            quote_lot_size: r.read_i64()?,
            base_lot_size: r.read_i64()?,
            long_funding: r.read_i80f48()?,
            short_funding: r.read_i80f48()?,
            open_interest: r.read_i64()?,
            last_updated: r.read_u64()?,
            seq_num: r.read_u64()?,
            fees_accrued: r.read_i80f48()?,
            liquidity_mining_info: LiquidityMiningInfo {
                rate: r.read_i80f48()?,
                max_depth_bps: r.read_i80f48()?,
                period_start: r.read_u64()?,
                target_period_length: r.read_u64()?,
                mngo_left: r.read_u64()?,
                mngo_per_period: r.read_u64()?,
            },
            mngo_vault: r.read_pubkey()?,
        })
    }
}
