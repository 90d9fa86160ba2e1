// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The configuration manager data repository.
//!
//! An append-only store of objects, each addressed by its object ID and either the token of the
//! whole entry or the token of one of its elements. The capacity is fixed when the repository is
//! created. Entries can grow in place with [`CmRepository::extend_entry`] but are never removed.

use super::{
    object::{CmObjectDescriptor, CmObjectId, CmToken},
    token::TokenAllocator,
};
use crate::{
    acpi::{AcpiDescriptionHeader, AcpiOemInfo, AmlGenerator},
    error::{Error, Result},
    platform::{Platform, PlatformImpl},
};
use alloc::vec::Vec;
use log::{debug, error, info};

/// Revision of the SSDT that collects the generated AML.
const SSDT_REVISION: u8 = 2;

/// One object stored in the repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepositoryEntry {
    object_id: CmObjectId,
    data: Vec<u8>,
    count: u32,
    token: CmToken,
    element_tokens: Vec<CmToken>,
}

impl RepositoryEntry {
    /// Returns the ID of the object.
    pub fn object_id(&self) -> CmObjectId {
        self.object_id
    }

    /// Returns the raw bytes of all elements.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of elements.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the token for the whole entry.
    pub fn token(&self) -> CmToken {
        self.token
    }

    /// Returns the tokens of the individual elements.
    ///
    /// A CmRef entry has a single element token however many references it holds.
    pub fn element_tokens(&self) -> &[CmToken] {
        &self.element_tokens
    }

    /// Returns a descriptor covering the whole entry.
    pub fn descriptor(&self) -> CmObjectDescriptor<'_> {
        CmObjectDescriptor::new(self.object_id, &self.data, self.count)
    }

    fn element_size(&self) -> usize {
        self.data.len() / self.count as usize
    }

    fn matches(&self, object_id: CmObjectId, token: CmToken) -> bool {
        self.object_id == object_id
            && (token.is_null() || token == self.token || self.element_tokens.contains(&token))
    }
}

/// The configuration manager data repository.
#[derive(Debug)]
pub struct CmRepository {
    entries: Vec<RepositoryEntry>,
    max_entries: usize,
    tokens: TokenAllocator,
}

impl CmRepository {
    /// Creates an empty repository able to hold `max_entries` entries.
    ///
    /// This also starts the SSDT which parsers add generated AML to, with the `_SB` scope open.
    pub fn new(
        max_entries: usize,
        oem: &AcpiOemInfo,
        generator: &mut impl AmlGenerator,
    ) -> Result<Self> {
        if max_entries == 0 {
            error!("Max entries can't be 0");
            return Err(Error::InvalidParameter);
        }
        let header = AcpiDescriptionHeader::new(*b"SSDT", SSDT_REVISION, oem);
        generator.initialize_table(&header)?;
        generator.start_scope("_SB")?;

        Ok(Self {
            entries: Vec::with_capacity(max_entries),
            max_entries,
            tokens: TokenAllocator::new(),
        })
    }

    /// Creates an empty repository with the platform's capacity and OEM identity.
    pub fn with_platform_config(generator: &mut impl AmlGenerator) -> Result<Self> {
        Self::new(
            PlatformImpl::MAX_CM_ENTRIES,
            &PlatformImpl::ACPI_OEM,
            generator,
        )
    }

    /// Returns all entries, in the order they were added.
    pub fn entries(&self) -> &[RepositoryEntry] {
        &self.entries
    }

    /// Reserves `count` tokens for objects that will be added later.
    pub fn allocate_tokens(&mut self, count: usize) -> Result<Vec<CmToken>> {
        self.tokens.allocate(count)
    }

    /// Adds a new entry, allocating a token for each element and one for the entry.
    ///
    /// Returns the element tokens and the entry token.
    pub fn add_entry(
        &mut self,
        object_id: CmObjectId,
        data: &[u8],
        count: u32,
    ) -> Result<(Vec<CmToken>, CmToken)> {
        self.check_can_add(count)?;
        let mut element_tokens = self.tokens.allocate(count as usize + 1)?;
        let token = element_tokens.pop().ok_or(Error::OutOfResources)?;
        self.add_entry_with_token_map(object_id, data, count, &element_tokens, token)?;
        Ok((element_tokens, token))
    }

    /// Adds a new entry with caller-provided element tokens and entry token.
    ///
    /// The data is copied into the repository.
    pub fn add_entry_with_token_map(
        &mut self,
        object_id: CmObjectId,
        data: &[u8],
        count: u32,
        element_tokens: &[CmToken],
        token: CmToken,
    ) -> Result<()> {
        self.check_can_add(count)?;
        // CmRef objects hold many references but only one token, which locates the object itself.
        let token_count = if object_id == CmObjectId::ARM_CM_REF {
            1
        } else {
            count as usize
        };
        let Some(element_tokens) = element_tokens.get(..token_count) else {
            error!(
                "Token map for {object_id:?} has {} tokens but {token_count} are needed",
                element_tokens.len()
            );
            return Err(Error::InvalidParameter);
        };

        self.entries.push(RepositoryEntry {
            object_id,
            data: data.to_vec(),
            count,
            token,
            element_tokens: element_tokens.to_vec(),
        });
        Ok(())
    }

    /// Adds a new entry with the given element tokens, allocating an entry token if `token` is
    /// null.
    ///
    /// Returns the entry token.
    pub fn add_entry_with_token(
        &mut self,
        object_id: CmObjectId,
        data: &[u8],
        count: u32,
        element_tokens: &[CmToken],
        token: CmToken,
    ) -> Result<CmToken> {
        let token = if token.is_null() {
            let tokens = self.tokens.allocate(1)?;
            tokens.first().copied().ok_or(Error::OutOfResources)?
        } else {
            token
        };
        self.add_entry_with_token_map(object_id, data, count, element_tokens, token)?;
        Ok(token)
    }

    /// Finds the first entry with the given ID whose entry token or one of whose element tokens
    /// is `token`. A null token matches any entry with the ID.
    pub fn find_entry(&self, object_id: CmObjectId, token: CmToken) -> Result<&RepositoryEntry> {
        match self.position(object_id, token) {
            Some(index) => Ok(&self.entries[index]),
            None => Err(self.not_found(object_id, token)),
        }
    }

    /// Returns the object or element addressed by `object_id` and `token`.
    ///
    /// If `token` is the token of one element, only that element is returned. Otherwise the whole
    /// entry is.
    pub fn get_object(
        &self,
        object_id: CmObjectId,
        token: CmToken,
    ) -> Result<CmObjectDescriptor<'_>> {
        let entry = self.find_entry(object_id, token)?;
        if token.is_null() || token == entry.token || entry.object_id == CmObjectId::ARM_CM_REF {
            return Ok(entry.descriptor());
        }
        let index = entry
            .element_tokens
            .iter()
            .position(|&element| element == token)
            .ok_or(Error::NotFound)?;
        let size = entry.element_size();
        let data = entry
            .data
            .get(index * size..(index + 1) * size)
            .ok_or(Error::NotFound)?;
        Ok(CmObjectDescriptor::new(object_id, data, 1))
    }

    /// Appends `count` elements to an existing entry.
    ///
    /// The entry is located as by [`find_entry`](Self::find_entry). The new elements must have the
    /// same size as the existing ones. Returns the tokens allocated for the new elements; the
    /// entry token does not change.
    pub fn extend_entry(
        &mut self,
        object_id: CmObjectId,
        data: &[u8],
        count: u32,
        token: CmToken,
    ) -> Result<Vec<CmToken>> {
        if count == 0 {
            error!("Can't extend {object_id:?} by 0 elements");
            return Err(Error::InvalidParameter);
        }
        if object_id == CmObjectId::ARM_CM_REF {
            error!("Can't extend CmRef objects");
            return Err(Error::InvalidParameter);
        }
        let Some(index) = self.position(object_id, token) else {
            return Err(self.not_found(object_id, token));
        };

        let element_size = self.entries[index].element_size();
        let new_element_size = data.len() / count as usize;
        if element_size != new_element_size {
            error!(
                "Previous element size of {object_id:?} is {element_size}, but extended element size is {new_element_size}"
            );
            return Err(Error::InvalidParameter);
        }

        let new_tokens = self.tokens.allocate(count as usize)?;
        let entry = &mut self.entries[index];
        entry.element_tokens.extend_from_slice(&new_tokens);
        entry.data.extend_from_slice(data);
        entry.count += count;
        Ok(new_tokens)
    }

    /// Checks that every token in the repository is unique and was allocated by it.
    pub fn sanity_check(&self) -> Result<()> {
        self.tokens.sanity_check(&self.entries)
    }

    fn check_can_add(&self, count: u32) -> Result<()> {
        if count == 0 {
            error!("Object count can't be 0");
            return Err(Error::InvalidParameter);
        }
        if self.entries.len() >= self.max_entries {
            error!(
                "Can't add a new entry (current entries = {}, max entries = {})",
                self.entries.len(),
                self.max_entries
            );
            return Err(Error::OutOfResources);
        }
        Ok(())
    }

    fn position(&self, object_id: CmObjectId, token: CmToken) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.matches(object_id, token))
    }

    fn not_found(&self, object_id: CmObjectId, token: CmToken) -> Error {
        info!("Failed to find an entry with ID {object_id}, token {token}");
        for (index, entry) in self.entries.iter().enumerate() {
            debug!("Entry[{index}] has ID {}", entry.object_id);
        }
        Error::NotFound
    }
}
