// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The per-building item exchange.
//!
//! Every finished building hosts an orderbook per item. Bids reserve coins
//! on placement, asks reserve items; matching is price-time priority and
//! executes at the resting order's price. The building owner collects
//! `dex_fee_bps` of every trade's value.
//!
//! Orders are user input: any precondition failure silently drops the
//! intent, per the consensus error-domain rules.

use tracing::debug;

use crate::ident::{Amount, Height, Id};
use crate::store::table::TableRow;
use crate::store::Store;

/// Which side of the book an order rests on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Buying; coins are reserved while the order rests.
    Bid,
    /// Selling; items are reserved while the order rests.
    Ask,
}

/// One resting order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DexOrder {
    /// Row id, which doubles as time priority.
    pub id: Id,
    /// Hosting building.
    pub building: Id,
    /// Placing account.
    pub account: String,
    /// Book side.
    pub side: Side,
    /// Traded item.
    pub item: String,
    /// Remaining quantity.
    pub quantity: u64,
    /// Limit price per unit in minor units.
    pub price: Amount,
}

impl DexOrder {
    /// Coins reserved by this order (zero for asks).
    #[must_use]
    pub fn reserved(&self) -> Amount {
        match self.side {
            Side::Bid => self.price * self.quantity,
            Side::Ask => 0,
        }
    }
}

impl TableRow for DexOrder {
    type Key = Id;

    fn key(&self) -> Id {
        self.id
    }
}

/// One executed trade, kept for the history export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trade {
    /// Block of execution.
    pub height: Height,
    /// Hosting building.
    pub building: Id,
    /// Traded item.
    pub item: String,
    /// Execution price per unit.
    pub price: Amount,
    /// Traded quantity.
    pub quantity: u64,
    /// Buying account.
    pub buyer: String,
    /// Selling account.
    pub seller: String,
}

fn building_open(store: &Store, building: Id) -> bool {
    store
        .buildings
        .read(&building, |b| !b.foundation)
        .unwrap_or(false)
}

fn pay_fee(store: &Store, building: Id, value: Amount) -> Amount {
    let (owner, fee_bps) = match store
        .buildings
        .read(&building, |b| (b.owner.clone(), b.config.dex_fee_bps))
    {
        Some(v) => v,
        None => return 0,
    };
    let fee = value * Amount::from(fee_bps) / 10_000;
    if fee == 0 {
        return 0;
    }
    if owner.is_empty() {
        store.money.borrow_mut().burnt += fee;
    } else {
        store.account_mut(&owner).payload_mut().balance += fee;
    }
    fee
}

/// Resting orders of `side` for `(building, item)`, in matching priority:
/// best price first, then id (time) ascending.
fn book_side(store: &Store, building: Id, item: &str, side: Side) -> Vec<(Amount, Id)> {
    let mut out: Vec<(Amount, Id)> = Vec::new();
    for id in store.orders.keys() {
        let entry = store.orders.read(&id, |o| {
            (o.building == building && o.item == item && o.side == side).then_some(o.price)
        });
        if let Some(Some(price)) = entry {
            out.push((price, id));
        }
    }
    match side {
        // Highest bid first.
        Side::Bid => out.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1))),
        // Lowest ask first.
        Side::Ask => out.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1))),
    }
    out
}

/// Places a bid, matching immediately against resting asks.
pub(crate) fn place_bid(
    store: &Store,
    height: Height,
    building: Id,
    account: &str,
    item: &str,
    quantity: u64,
    price: Amount,
) {
    if quantity == 0 || !building_open(store, building) {
        debug!(account, item, "dropping invalid bid");
        return;
    }
    let reserve = price * quantity;
    {
        let mut acc = store.account_mut(account);
        if acc.balance < reserve {
            debug!(account, item, "bid exceeds balance");
            return;
        }
        acc.payload_mut().balance -= reserve;
    }

    let mut remaining = quantity;
    for (ask_price, ask_id) in book_side(store, building, item, Side::Ask) {
        if remaining == 0 || ask_price > price {
            break;
        }
        let Some(mut ask) = store.orders.checkout(&ask_id) else {
            continue;
        };
        let qty = remaining.min(ask.quantity);
        let value = ask_price * qty;
        let fee = pay_fee(store, building, value);
        let seller = ask.account.clone();
        store.account_mut(&seller).payload_mut().balance += value - fee;
        // The buyer reserved at the bid price; the execution at the lower
        // resting price refunds the difference right away.
        store.account_mut(account).payload_mut().balance += (price - ask_price) * qty;
        store.building_inv.with(building, account, |inv| {
            inv.add(item, qty);
        });
        store.trades.borrow_mut().push(Trade {
            height,
            building,
            item: item.to_owned(),
            price: ask_price,
            quantity: qty,
            buyer: account.to_owned(),
            seller,
        });
        remaining -= qty;
        if qty == ask.quantity {
            ask.delete();
        } else {
            ask.payload_mut().quantity -= qty;
        }
    }

    if remaining > 0 {
        let id = store.next_id();
        store.orders.insert(DexOrder {
            id,
            building,
            account: account.to_owned(),
            side: Side::Bid,
            item: item.to_owned(),
            quantity: remaining,
            price,
        });
    }
}

/// Places an ask, matching immediately against resting bids.
pub(crate) fn place_ask(
    store: &Store,
    height: Height,
    building: Id,
    account: &str,
    item: &str,
    quantity: u64,
    price: Amount,
) {
    if quantity == 0 || !building_open(store, building) {
        debug!(account, item, "dropping invalid ask");
        return;
    }
    let withdrawn = store
        .building_inv
        .with(building, account, |inv| inv.remove(item, quantity));
    if withdrawn < quantity {
        // Not enough stock; put back what was taken.
        store.building_inv.with(building, account, |inv| {
            inv.add(item, withdrawn);
        });
        debug!(account, item, "ask exceeds deposited stock");
        return;
    }

    let mut remaining = quantity;
    for (bid_price, bid_id) in book_side(store, building, item, Side::Bid) {
        if remaining == 0 || bid_price < price {
            break;
        }
        let Some(mut bid) = store.orders.checkout(&bid_id) else {
            continue;
        };
        let qty = remaining.min(bid.quantity);
        let value = bid_price * qty;
        let fee = pay_fee(store, building, value);
        store.account_mut(account).payload_mut().balance += value - fee;
        let buyer = bid.account.clone();
        store.building_inv.with(building, &buyer, |inv| {
            inv.add(item, qty);
        });
        store.trades.borrow_mut().push(Trade {
            height,
            building,
            item: item.to_owned(),
            price: bid_price,
            quantity: qty,
            buyer,
            seller: account.to_owned(),
        });
        remaining -= qty;
        if qty == bid.quantity {
            bid.delete();
        } else {
            bid.payload_mut().quantity -= qty;
        }
    }

    if remaining > 0 {
        let id = store.next_id();
        store.orders.insert(DexOrder {
            id,
            building,
            account: account.to_owned(),
            side: Side::Ask,
            item: item.to_owned(),
            quantity: remaining,
            price,
        });
    }
}

/// Cancels an order if `account` owns it, releasing the reservation.
pub(crate) fn cancel_order(store: &Store, account: &str, order: Id) {
    let owned = store
        .orders
        .read(&order, |o| o.account == account)
        .unwrap_or(false);
    if !owned {
        debug!(account, order, "dropping cancel of foreign or unknown order");
        return;
    }
    let Some(handle) = store.orders.checkout(&order) else {
        return;
    };
    release_order(store, &handle);
    handle.delete();
}

/// Releases an order's reservation back to its owner.
fn release_order(store: &Store, order: &DexOrder) {
    match order.side {
        Side::Bid => {
            store.account_mut(&order.account).payload_mut().balance += order.reserved();
        }
        Side::Ask => {
            store
                .building_inv
                .with(order.building, &order.account, |inv| {
                    inv.add(&order.item, order.quantity);
                });
        }
    }
}

/// Cancels every order hosted by a destroyed building.
///
/// Bid reservations refund to balances; ask items return to the building's
/// per-account inventories so the subsequent loot drop carries them.
pub(crate) fn cancel_building_orders(store: &Store, building: Id) {
    for id in store.orders.keys() {
        let hosted = store
            .orders
            .read(&id, |o| o.building == building)
            .unwrap_or(false);
        if !hosted {
            continue;
        }
        let Some(handle) = store.orders.checkout(&id) else {
            continue;
        };
        release_order(store, &handle);
        handle.delete();
    }
}
