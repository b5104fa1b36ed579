// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Decision artifacts implementing [`Inference`](crate::Inference).

pub mod fixed;
pub mod tree;
