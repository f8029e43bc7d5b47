/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Diesel table definitions, one module per backend.
//!
//! The column sets are identical; only the storage types differ.

#[cfg(feature = "postgres")]
pub mod postgres {
    diesel::table! {
        jobs (id) {
            id -> Int8,
            queue -> Varchar,
            status -> Varchar,
            payload -> Jsonb,
            result -> Nullable<Jsonb>,
            progress -> Int4,
            worker_id -> Nullable<Varchar>,
            owner -> Nullable<Varchar>,
            attempts -> Int4,
            max_retries -> Int4,
            created_at -> Timestamp,
            updated_at -> Timestamp,
        }
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    diesel::table! {
        jobs (id) {
            id -> BigInt,
            queue -> Text,
            status -> Text,
            payload -> Text,
            result -> Nullable<Text>,
            progress -> Integer,
            worker_id -> Nullable<Text>,
            owner -> Nullable<Text>,
            attempts -> Integer,
            max_retries -> Integer,
            created_at -> Text,
            updated_at -> Text,
        }
    }
}
