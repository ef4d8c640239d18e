// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

mod browser_test;
mod helpers;
mod pagination_test;
mod scrape_test;
