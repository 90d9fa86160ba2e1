// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Allocation and validation of repository tokens.

use super::{object::CmToken, repository::RepositoryEntry};
use crate::error::{Error, Result};
use alloc::{vec, vec::Vec};
use log::{error, trace};

/// The first token handed out.
pub const INITIAL_TOKEN_VALUE: u64 = CmToken::NULL.0 + 1;

/// Hands out unique, never reused tokens in increasing order.
#[derive(Debug)]
pub struct TokenAllocator {
    next: u64,
}

impl TokenAllocator {
    /// Creates an allocator whose first token is [`INITIAL_TOKEN_VALUE`].
    pub const fn new() -> Self {
        Self {
            next: INITIAL_TOKEN_VALUE,
        }
    }

    /// Reserves `count` consecutive tokens.
    ///
    /// Returns an empty list if `count` is 0, or `OutOfResources` if the range would reach the
    /// null token.
    pub fn allocate(&mut self, count: usize) -> Result<Vec<CmToken>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let count = count as u64;
        // The tokens are next..=next + count - 1, which must not wrap round to the null token.
        if self.next == CmToken::NULL.0 || count - 1 > u64::MAX - self.next {
            error!(
                "Requested {count} tokens, but allocating them after {} would overflow the null token",
                self.next
            );
            return Err(Error::OutOfResources);
        }
        let tokens = (self.next..=self.next + (count - 1)).map(CmToken).collect();
        self.next = self.next.wrapping_add(count);
        Ok(tokens)
    }

    /// Returns the token the next allocation will start from.
    pub fn next_token(&self) -> CmToken {
        CmToken(self.next)
    }

    /// Checks that every token stored in `entries` was allocated here and appears exactly once.
    ///
    /// Returns `InvalidParameter` for a token that was never allocated and `DeviceError` for a
    /// token used twice. Null tokens are ignored.
    pub fn sanity_check(&self, entries: &[RepositoryEntry]) -> Result<()> {
        let mut checker = SanityChecker::new(self.next)?;
        for (index, entry) in entries.iter().enumerate() {
            checker.check(entry.token()).inspect_err(|e| {
                error!("Got {e} for entry {index}");
            })?;
            for (map_index, &token) in entry.element_tokens().iter().enumerate() {
                checker.check(token).inspect_err(|e| {
                    error!("Got {e} for entry {index} element {map_index}");
                })?;
            }
        }
        Ok(())
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Bitmap over all allocated tokens, marking which have been seen.
struct SanityChecker {
    last: u64,
    seen: Vec<u64>,
}

impl SanityChecker {
    fn new(next: u64) -> Result<Self> {
        let last = next.wrapping_sub(1);
        let range = usize::try_from(last.wrapping_sub(INITIAL_TOKEN_VALUE).wrapping_add(1))
            .map_err(|_| Error::OutOfResources)?;
        trace!("Sanity checking tokens {INITIAL_TOKEN_VALUE} to {last}");
        Ok(Self {
            last,
            seen: vec![0; range.div_ceil(64)],
        })
    }

    fn check(&mut self, token: CmToken) -> Result<()> {
        if token.is_null() {
            return Ok(());
        }
        if token.0 < INITIAL_TOKEN_VALUE || token.0 > self.last {
            error!("Token {token} is out of range");
            return Err(Error::InvalidParameter);
        }
        let bit_index = token.0 - INITIAL_TOKEN_VALUE;
        let (offset, bit) = ((bit_index / 64) as usize, bit_index % 64);
        if self.seen[offset] & (1 << bit) != 0 {
            error!("Token {token} has already been seen");
            return Err(Error::DeviceError);
        }
        self.seen[offset] |= 1 << bit;
        Ok(())
    }
}
