// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Dataset storage
//
// Writes SigMF dataset pairs to the local filesystem. Data files are
// append-only and never overwritten; metadata documents are written
// whole at rotation or shutdown.

pub mod dataset;

pub use dataset::{stem_with_extension, DatasetWriter};
