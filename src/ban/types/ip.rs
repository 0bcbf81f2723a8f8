//! Ban type for IP addresses
//!
//! Items are IPv4 or IPv6 addresses. A `*` matches any run of characters, so
//! `10.0.*` covers the whole `10.0.0.0/16` range. Wildcard patterns are matched
//! against the compressed text form of an address, so IPv6 patterns must be
//! written without leading zeros (`2001:db8:*`, not `2001:0db8:*`).

use super::{BanType, BanTypeBase, Subject, remove_items, store_items, tidy_mode};
use crate::ban::{BanError, BanResult, BanStore, CheckResult, Clock};
use glob::Pattern;
use std::net::IpAddr;
use std::sync::Arc;

const MODE: &str = "ip";

pub struct IpBanType {
    base: BanTypeBase,
    store: BanStore,
}

impl IpBanType {
    pub fn new(store: BanStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: BanTypeBase::new(clock),
            store,
        }
    }

    fn addresses(&self) -> BanResult<Vec<String>> {
        let mut addresses = Vec::with_capacity(self.base.items().len());

        for item in self.base.items() {
            let address = normalize(item)?;
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }

        Ok(addresses)
    }
}

/// Lowercase an address or wildcard pattern and reject anything else
fn normalize(item: &str) -> BanResult<String> {
    let address = item.trim().to_lowercase();
    let invalid = || BanError::InvalidItem(format!("not an ip address: {item}"));

    if address.contains('*') {
        let allowed = address
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, '.' | ':' | '*'));
        if !allowed || address.chars().all(|c| c == '*') || has_padded_group(&address) {
            return Err(invalid());
        }
        Pattern::new(&address).map_err(|_| invalid())?;
        return Ok(address);
    }

    address
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| invalid())
}

// `0db8` or `010` can never appear in a displayed address
fn has_padded_group(pattern: &str) -> bool {
    pattern.split(['.', ':']).any(|group| {
        let mut chars = group.chars();
        chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_hexdigit())
    })
}

fn matches_ip(item: &str, ip: &str) -> bool {
    if item.contains('*') {
        Pattern::new(item).is_ok_and(|pattern| pattern.matches(ip))
    } else {
        item == ip
    }
}

impl BanType for IpBanType {
    fn base(&self) -> &BanTypeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BanTypeBase {
        &mut self.base
    }

    fn ban(&mut self) -> BanResult<bool> {
        let addresses = self.addresses()?;
        Ok(store_items(
            &mut self.base,
            &self.store,
            MODE,
            &addresses,
            false,
            "LOG_BAN_IP",
        ))
    }

    fn exclude(&mut self) -> BanResult<Option<bool>> {
        let addresses = self.addresses()?;
        Ok(Some(store_items(
            &mut self.base,
            &self.store,
            MODE,
            &addresses,
            true,
            "LOG_BAN_EXCLUDE_IP",
        )))
    }

    fn check(&self, subject: &Subject) -> CheckResult {
        let Ok(ip) = subject.ip.trim().parse::<IpAddr>() else {
            return CheckResult::NoResult;
        };
        let ip = ip.to_string();

        self.store.check(MODE, self.base.now(), |record| {
            matches_ip(&record.item, &ip)
        })
    }

    fn remove(&mut self) -> BanResult<bool> {
        let addresses = self.addresses()?;
        Ok(remove_items(
            &mut self.base,
            &self.store,
            MODE,
            &addresses,
            "LOG_UNBAN_IP",
        ))
    }

    fn tidy(&mut self) -> bool {
        tidy_mode(&self.base, &self.store, MODE)
    }

    fn is_exclude_possible(&self) -> bool {
        true
    }
}
