// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration manager data: the token-indexed object repository and the helpers parsers use
//! to fill it.

pub mod desc;
pub mod object;
pub mod parser;
pub mod repository;
pub mod resource;
pub mod token;

pub use object::{CmObjectDescriptor, CmObjectId, CmToken, ObjectNamespace};
pub use repository::{CmRepository, RepositoryEntry};
pub use token::TokenAllocator;
