// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Helpers used by parsers to describe objects and add them to the repository.

use super::{
    object::{AcpiTableInfo, CmObjectDescriptor, CmObjectId, CmToken, tokens_as_bytes},
    repository::CmRepository,
};
use crate::error::{Error, Result};
use alloc::vec::Vec;
use core::mem::size_of;
use log::{debug, error};
use zerocopy::IntoBytes;

/// Describes `count` elements laid out back to back in `data`.
///
/// Fails if `count` is 0 or `data` can't be split into `count` elements of equal size.
pub fn create_cm_obj_desc(
    object_id: CmObjectId,
    count: u32,
    data: &[u8],
) -> Result<CmObjectDescriptor<'_>> {
    if count == 0 {
        error!("Count can't be 0");
        return Err(Error::InvalidParameter);
    }
    if data.len() % count as usize != 0 {
        error!(
            "{} bytes of {object_id:?} can't be split into {count} elements",
            data.len()
        );
        return Err(Error::InvalidParameter);
    }
    Ok(CmObjectDescriptor::new(object_id, data, count))
}

/// Adds a single object and returns the token of its entry.
///
/// A CmRef object holds one reference per token in `data`.
pub fn add_single_cm_obj(
    repository: &mut CmRepository,
    object_id: CmObjectId,
    data: &[u8],
) -> Result<CmToken> {
    let count = if object_id == CmObjectId::ARM_CM_REF {
        (data.len() / size_of::<CmToken>()) as u32
    } else {
        1
    };
    let (_, token) = repository.add_entry(object_id, data, count)?;
    Ok(token)
}

/// Adds all the elements of `desc` as one entry.
///
/// Returns a token for each element and the token of the entry.
pub fn add_multiple_cm_obj_get_tokens(
    repository: &mut CmRepository,
    desc: &CmObjectDescriptor,
) -> Result<(Vec<CmToken>, CmToken)> {
    if desc.count == 0 {
        error!("Descriptor count can't be 0");
        return Err(Error::InvalidParameter);
    }
    repository.add_entry(desc.object_id, desc.data, desc.count)
}

/// Adds all the elements of `desc` as one entry, using tokens reserved earlier.
///
/// A new entry token is allocated if `token` is null. Returns the entry token.
pub fn add_multiple_cm_obj_with_tokens(
    repository: &mut CmRepository,
    desc: &CmObjectDescriptor,
    element_tokens: &[CmToken],
    token: CmToken,
) -> Result<CmToken> {
    if desc.count == 0 {
        error!("Descriptor count can't be 0");
        return Err(Error::InvalidParameter);
    }
    repository.add_entry_with_token(desc.object_id, desc.data, desc.count, element_tokens, token)
}

/// Adds all the elements of `desc`, then a CmRef object listing their element tokens.
///
/// `element_tokens` are used for the elements if given, otherwise new ones are allocated. Returns
/// the token of the CmRef entry.
pub fn add_multiple_cm_obj_with_cm_obj_ref(
    repository: &mut CmRepository,
    desc: &CmObjectDescriptor,
    element_tokens: Option<&[CmToken]>,
) -> Result<CmToken> {
    if desc.count == 0 {
        error!("Descriptor count can't be 0");
        return Err(Error::InvalidParameter);
    }
    let element_tokens = match element_tokens {
        Some(tokens) => {
            repository.add_entry_with_token(
                desc.object_id,
                desc.data,
                desc.count,
                tokens,
                CmToken::NULL,
            )?;
            tokens
                .get(..desc.count as usize)
                .ok_or(Error::InvalidParameter)?
                .to_vec()
        }
        None => repository.add_entry(desc.object_id, desc.data, desc.count)?.0,
    };
    let references = tokens_as_bytes(&element_tokens);
    let (_, token) = repository.add_entry(CmObjectId::ARM_CM_REF, &references, desc.count)?;
    Ok(token)
}

/// Reserves `count` tokens for objects that will be added later.
pub fn allocate_cm_tokens(repository: &mut CmRepository, count: u32) -> Result<Vec<CmToken>> {
    if count == 0 {
        error!("Count can't be 0");
        return Err(Error::InvalidParameter);
    }
    repository.allocate_tokens(count as usize)
}

/// Appends the elements of `desc` to the entry located by its object ID and `token`.
///
/// Returns the tokens of the new elements.
pub fn extend_cm_obj(
    repository: &mut CmRepository,
    desc: &CmObjectDescriptor,
    token: CmToken,
) -> Result<Vec<CmToken>> {
    repository.extend_entry(desc.object_id, desc.data, desc.count, token)
}

/// Returns the object or single element addressed by `object_id` and `token`.
pub fn find_entry(
    repository: &CmRepository,
    object_id: CmObjectId,
    token: CmToken,
) -> Result<CmObjectDescriptor<'_>> {
    let result = repository.get_object(object_id, token);
    debug!(
        "Finding {object_id:?} with token {token} returned {:?}",
        result.as_ref().map(|desc| desc.count)
    );
    result
}

/// Adds a table to the ACPI table list, creating the list if this is the first table.
pub fn add_acpi_table_generator(
    repository: &mut CmRepository,
    table: &AcpiTableInfo,
) -> Result<()> {
    let desc = CmObjectDescriptor::new(CmObjectId::STD_ACPI_TABLE_LIST, table.as_bytes(), 1);
    match repository.extend_entry(desc.object_id, desc.data, desc.count, CmToken::NULL) {
        Ok(_) => Ok(()),
        Err(Error::NotFound) => {
            add_multiple_cm_obj_get_tokens(repository, &desc)?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
