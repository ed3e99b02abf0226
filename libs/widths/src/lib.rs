// This file is part of pdfr-rs.
//
// pdfr-rs is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// pdfr-rs is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with pdfr-rs.  If not, see <http://www.gnu.org/licenses/>.
//! Glyph-width resolution: the core-14 AFM width tables used as a
//! fallback for non-embedded standard fonts, `/Widths`+`/FirstChar`
//! resolution for simple fonts, and `/DescendantFonts[0]/W` parsing for
//! composite (Type0/CID) fonts.

use std::collections::HashMap;

use lazy_static::lazy_static;
use pdfr_dictionary::Value;

/// Fallback width, in 1/1000 em, used whenever a code has no entry
/// anywhere in the resolved width table.
pub const DEFAULT_WIDTH: u32 = 500;

/// All core-14 width tables are keyed by Unicode scalar value rather than
/// raw character code, because the standard-14 fonts are always
/// interpreted through a named base encoding (Standard/WinAnsi) before
/// their widths are looked up.
type WidthMap = HashMap<u16, u32>;

macro_rules! width_table {
    ($name:ident, [$(($code:expr, $width:expr)),* $(,)?]) => {
        lazy_static! {
            static ref $name: WidthMap = {
                let mut m = HashMap::new();
                $(m.insert($code, $width);)*
                m
            };
        }
    };
}

width_table!(COURIER_WIDTHS, [
    (0x0020, 600), (0x0021, 600), (0x0022, 600), (0x0023, 600),
    (0x0024, 600), (0x0025, 600), (0x0026, 600), (0x0027, 600),
    (0x0028, 600), (0x0029, 600), (0x002a, 600), (0x002b, 600),
    (0x002c, 600), (0x002d, 600), (0x002e, 600), (0x002f, 600),
    (0x0030, 600), (0x0031, 600), (0x0032, 600), (0x0033, 600),
    (0x0034, 600), (0x0035, 600), (0x0036, 600), (0x0037, 600),
    (0x0038, 600), (0x0039, 600), (0x003a, 600), (0x003b, 600),
    (0x003c, 600), (0x003d, 600), (0x003e, 600), (0x003f, 600),
    (0x0040, 600), (0x0041, 600), (0x0042, 600), (0x0043, 600),
    (0x0044, 600), (0x0045, 600), (0x0046, 600), (0x0047, 600),
    (0x0048, 600), (0x0049, 600), (0x004a, 600), (0x004b, 600),
    (0x004c, 600), (0x004d, 600), (0x004e, 600), (0x004f, 600),
    (0x0050, 600), (0x0051, 600), (0x0052, 600), (0x0053, 600),
    (0x0054, 600), (0x0055, 600), (0x0056, 600), (0x0057, 600),
    (0x0058, 600), (0x0059, 600), (0x005a, 600), (0x005b, 600),
    (0x005c, 600), (0x005d, 600), (0x005e, 600), (0x005f, 600),
    (0x0060, 600), (0x0061, 600), (0x0062, 600), (0x0063, 600),
    (0x0064, 600), (0x0065, 600), (0x0066, 600), (0x0067, 600),
    (0x0068, 600), (0x0069, 600), (0x006a, 600), (0x006b, 600),
    (0x006c, 600), (0x006d, 600), (0x006e, 600), (0x006f, 600),
    (0x0070, 600), (0x0071, 600), (0x0072, 600), (0x0073, 600),
    (0x0074, 600), (0x0075, 600), (0x0076, 600), (0x0077, 600),
    (0x0078, 600), (0x0079, 600), (0x007a, 600), (0x007b, 600),
    (0x007c, 600), (0x007d, 600), (0x007e, 600),
]);

width_table!(HELVETICA_WIDTHS, [
    (0x0020, 278), (0x0021, 278), (0x0022, 355), (0x0023, 556),
    (0x0024, 556), (0x0025, 889), (0x0026, 667), (0x0027, 222),
    (0x0028, 333), (0x0029, 333), (0x002a, 389), (0x002b, 584),
    (0x002c, 278), (0x002d, 333), (0x002e, 278), (0x002f, 278),
    (0x0030, 556), (0x0031, 556), (0x0032, 556), (0x0033, 556),
    (0x0034, 556), (0x0035, 556), (0x0036, 556), (0x0037, 556),
    (0x0038, 556), (0x0039, 556), (0x003a, 278), (0x003b, 278),
    (0x003c, 584), (0x003d, 584), (0x003e, 584), (0x003f, 556),
    (0x0040, 1015), (0x0041, 667), (0x0042, 667), (0x0043, 722),
    (0x0044, 722), (0x0045, 667), (0x0046, 611), (0x0047, 778),
    (0x0048, 722), (0x0049, 278), (0x004a, 500), (0x004b, 667),
    (0x004c, 556), (0x004d, 833), (0x004e, 722), (0x004f, 778),
    (0x0050, 667), (0x0051, 778), (0x0052, 722), (0x0053, 667),
    (0x0054, 611), (0x0055, 722), (0x0056, 667), (0x0057, 944),
    (0x0058, 667), (0x0059, 667), (0x005a, 611), (0x005b, 278),
    (0x005c, 278), (0x005d, 278), (0x005e, 469), (0x005f, 556),
    (0x0060, 222), (0x0061, 556), (0x0062, 556), (0x0063, 500),
    (0x0064, 556), (0x0065, 556), (0x0066, 278), (0x0067, 556),
    (0x0068, 556), (0x0069, 222), (0x006a, 222), (0x006b, 500),
    (0x006c, 222), (0x006d, 833), (0x006e, 556), (0x006f, 556),
    (0x0070, 556), (0x0071, 556), (0x0072, 333), (0x0073, 500),
    (0x0074, 278), (0x0075, 556), (0x0076, 500), (0x0077, 722),
    (0x0078, 500), (0x0079, 500), (0x007a, 500), (0x007b, 334),
    (0x007c, 260), (0x007d, 334), (0x007e, 584),
]);

width_table!(HELVETICA_BOLD_WIDTHS, [
    (0x0020, 278), (0x0021, 333), (0x0022, 474), (0x0023, 556),
    (0x0024, 556), (0x0025, 889), (0x0026, 722), (0x0027, 278),
    (0x0028, 333), (0x0029, 333), (0x002a, 389), (0x002b, 584),
    (0x002c, 278), (0x002d, 333), (0x002e, 278), (0x002f, 278),
    (0x0030, 556), (0x0031, 556), (0x0032, 556), (0x0033, 556),
    (0x0034, 556), (0x0035, 556), (0x0036, 556), (0x0037, 556),
    (0x0038, 556), (0x0039, 556), (0x003a, 333), (0x003b, 333),
    (0x003c, 584), (0x003d, 584), (0x003e, 584), (0x003f, 611),
    (0x0040, 975), (0x0041, 722), (0x0042, 722), (0x0043, 722),
    (0x0044, 722), (0x0045, 667), (0x0046, 611), (0x0047, 778),
    (0x0048, 722), (0x0049, 278), (0x004a, 556), (0x004b, 722),
    (0x004c, 611), (0x004d, 833), (0x004e, 722), (0x004f, 778),
    (0x0050, 667), (0x0051, 778), (0x0052, 722), (0x0053, 667),
    (0x0054, 611), (0x0055, 722), (0x0056, 667), (0x0057, 944),
    (0x0058, 667), (0x0059, 667), (0x005a, 611), (0x005b, 333),
    (0x005c, 278), (0x005d, 333), (0x005e, 584), (0x005f, 556),
    (0x0060, 278), (0x0061, 556), (0x0062, 611), (0x0063, 556),
    (0x0064, 611), (0x0065, 556), (0x0066, 333), (0x0067, 611),
    (0x0068, 611), (0x0069, 278), (0x006a, 278), (0x006b, 556),
    (0x006c, 278), (0x006d, 889), (0x006e, 611), (0x006f, 611),
    (0x0070, 611), (0x0071, 611), (0x0072, 389), (0x0073, 556),
    (0x0074, 333), (0x0075, 611), (0x0076, 556), (0x0077, 778),
    (0x0078, 556), (0x0079, 556), (0x007a, 500), (0x007b, 389),
    (0x007c, 280), (0x007d, 389), (0x007e, 584),
]);

width_table!(SYMBOL_WIDTHS, [
    (0x0020, 250), (0x0021, 333), (0x0022, 713), (0x0023, 500),
    (0x0024, 549), (0x0025, 833), (0x0026, 778), (0x0027, 439),
    (0x0028, 333), (0x0029, 333), (0x002a, 500), (0x002b, 549),
    (0x002c, 250), (0x002d, 549), (0x002e, 250), (0x002f, 278),
    (0x0030, 500), (0x0031, 500), (0x0032, 500), (0x0033, 500),
    (0x0034, 500), (0x0035, 500), (0x0036, 500), (0x0037, 500),
    (0x0038, 500), (0x0039, 500), (0x003a, 278), (0x003b, 278),
    (0x003c, 549), (0x003d, 549), (0x003e, 549), (0x003f, 444),
    (0x0040, 549), (0x0041, 722), (0x0042, 667), (0x0043, 722),
    (0x0044, 612), (0x0045, 611), (0x0046, 763), (0x0047, 603),
    (0x0048, 722), (0x0049, 333), (0x004a, 631), (0x004b, 722),
    (0x004c, 686), (0x004d, 889), (0x004e, 722), (0x004f, 722),
    (0x0050, 768), (0x0051, 741), (0x0052, 556), (0x0053, 592),
    (0x0054, 611), (0x0055, 690), (0x0056, 439), (0x0057, 768),
    (0x0058, 645), (0x0059, 795), (0x005a, 611), (0x005b, 333),
    (0x005c, 863), (0x005d, 333), (0x005e, 658), (0x005f, 500),
    (0x0060, 500), (0x0061, 631), (0x0062, 549), (0x0063, 549),
    (0x0064, 494), (0x0065, 439), (0x0066, 521), (0x0067, 411),
    (0x0068, 603), (0x0069, 329), (0x006a, 603), (0x006b, 549),
    (0x006c, 549), (0x006d, 576), (0x006e, 521), (0x006f, 549),
    (0x0070, 549), (0x0071, 521), (0x0072, 549), (0x0073, 603),
    (0x0074, 439), (0x0075, 576), (0x0076, 713), (0x0077, 686),
    (0x0078, 493), (0x0079, 686), (0x007a, 494), (0x007b, 480),
    (0x007c, 200), (0x007d, 480), (0x007e, 549),
]);

width_table!(TIMES_BOLD_WIDTHS, [
    (0x0020, 250), (0x0021, 333), (0x0022, 555), (0x0023, 500),
    (0x0024, 500), (0x0025, 1000), (0x0026, 833), (0x0027, 333),
    (0x0028, 333), (0x0029, 333), (0x002a, 500), (0x002b, 570),
    (0x002c, 250), (0x002d, 333), (0x002e, 250), (0x002f, 278),
    (0x0030, 500), (0x0031, 500), (0x0032, 500), (0x0033, 500),
    (0x0034, 500), (0x0035, 500), (0x0036, 500), (0x0037, 500),
    (0x0038, 500), (0x0039, 500), (0x003a, 333), (0x003b, 333),
    (0x003c, 570), (0x003d, 570), (0x003e, 570), (0x003f, 500),
    (0x0040, 930), (0x0041, 722), (0x0042, 667), (0x0043, 722),
    (0x0044, 722), (0x0045, 667), (0x0046, 611), (0x0047, 778),
    (0x0048, 778), (0x0049, 389), (0x004a, 500), (0x004b, 778),
    (0x004c, 667), (0x004d, 944), (0x004e, 722), (0x004f, 778),
    (0x0050, 611), (0x0051, 778), (0x0052, 722), (0x0053, 556),
    (0x0054, 667), (0x0055, 722), (0x0056, 722), (0x0057, 1000),
    (0x0058, 722), (0x0059, 722), (0x005a, 667), (0x005b, 333),
    (0x005c, 278), (0x005d, 333), (0x005e, 581), (0x005f, 500),
    (0x0060, 333), (0x0061, 500), (0x0062, 556), (0x0063, 444),
    (0x0064, 556), (0x0065, 444), (0x0066, 333), (0x0067, 500),
    (0x0068, 556), (0x0069, 278), (0x006a, 333), (0x006b, 556),
    (0x006c, 278), (0x006d, 833), (0x006e, 556), (0x006f, 500),
    (0x0070, 556), (0x0071, 556), (0x0072, 444), (0x0073, 389),
    (0x0074, 333), (0x0075, 556), (0x0076, 500), (0x0077, 722),
    (0x0078, 500), (0x0079, 500), (0x007a, 444), (0x007b, 394),
    (0x007c, 220), (0x007d, 394), (0x007e, 520),
]);

width_table!(TIMES_BOLD_ITALIC_WIDTHS, [
    (0x0020, 250), (0x0021, 389), (0x0022, 555), (0x0023, 500),
    (0x0024, 500), (0x0025, 833), (0x0026, 778), (0x0027, 333),
    (0x0028, 333), (0x0029, 333), (0x002a, 500), (0x002b, 570),
    (0x002c, 250), (0x002d, 333), (0x002e, 250), (0x002f, 278),
    (0x0030, 500), (0x0031, 500), (0x0032, 500), (0x0033, 500),
    (0x0034, 500), (0x0035, 500), (0x0036, 500), (0x0037, 500),
    (0x0038, 500), (0x0039, 500), (0x003a, 333), (0x003b, 333),
    (0x003c, 570), (0x003d, 570), (0x003e, 570), (0x003f, 500),
    (0x0040, 832), (0x0041, 667), (0x0042, 667), (0x0043, 667),
    (0x0044, 722), (0x0045, 667), (0x0046, 667), (0x0047, 722),
    (0x0048, 778), (0x0049, 389), (0x004a, 500), (0x004b, 667),
    (0x004c, 611), (0x004d, 889), (0x004e, 722), (0x004f, 722),
    (0x0050, 611), (0x0051, 722), (0x0052, 667), (0x0053, 556),
    (0x0054, 611), (0x0055, 722), (0x0056, 667), (0x0057, 889),
    (0x0058, 667), (0x0059, 611), (0x005a, 611), (0x005b, 333),
    (0x005c, 278), (0x005d, 333), (0x005e, 570), (0x005f, 500),
    (0x0060, 333), (0x0061, 500), (0x0062, 500), (0x0063, 444),
    (0x0064, 500), (0x0065, 444), (0x0066, 333), (0x0067, 500),
    (0x0068, 556), (0x0069, 278), (0x006a, 278), (0x006b, 500),
    (0x006c, 278), (0x006d, 778), (0x006e, 556), (0x006f, 500),
    (0x0070, 500), (0x0071, 500), (0x0072, 389), (0x0073, 389),
    (0x0074, 278), (0x0075, 556), (0x0076, 444), (0x0077, 667),
    (0x0078, 500), (0x0079, 444), (0x007a, 389), (0x007b, 348),
    (0x007c, 220), (0x007d, 348), (0x007e, 570),
]);

width_table!(TIMES_ITALIC_WIDTHS, [
    (0x0020, 250), (0x0021, 333), (0x0022, 420), (0x0023, 500),
    (0x0024, 500), (0x0025, 833), (0x0026, 778), (0x0027, 333),
    (0x0028, 333), (0x0029, 333), (0x002a, 500), (0x002b, 675),
    (0x002c, 250), (0x002d, 333), (0x002e, 250), (0x002f, 278),
    (0x0030, 500), (0x0031, 500), (0x0032, 500), (0x0033, 500),
    (0x0034, 500), (0x0035, 500), (0x0036, 500), (0x0037, 500),
    (0x0038, 500), (0x0039, 500), (0x003a, 333), (0x003b, 333),
    (0x003c, 675), (0x003d, 675), (0x003e, 675), (0x003f, 500),
    (0x0040, 920), (0x0041, 611), (0x0042, 611), (0x0043, 667),
    (0x0044, 722), (0x0045, 611), (0x0046, 611), (0x0047, 722),
    (0x0048, 722), (0x0049, 333), (0x004a, 444), (0x004b, 667),
    (0x004c, 556), (0x004d, 833), (0x004e, 667), (0x004f, 722),
    (0x0050, 611), (0x0051, 722), (0x0052, 611), (0x0053, 500),
    (0x0054, 556), (0x0055, 722), (0x0056, 611), (0x0057, 833),
    (0x0058, 611), (0x0059, 556), (0x005a, 556), (0x005b, 389),
    (0x005c, 278), (0x005d, 389), (0x005e, 422), (0x005f, 500),
    (0x0060, 333), (0x0061, 500), (0x0062, 500), (0x0063, 444),
    (0x0064, 500), (0x0065, 444), (0x0066, 278), (0x0067, 500),
    (0x0068, 500), (0x0069, 278), (0x006a, 278), (0x006b, 444),
    (0x006c, 278), (0x006d, 722), (0x006e, 500), (0x006f, 500),
    (0x0070, 500), (0x0071, 500), (0x0072, 389), (0x0073, 389),
    (0x0074, 278), (0x0075, 500), (0x0076, 444), (0x0077, 667),
    (0x0078, 444), (0x0079, 444), (0x007a, 389), (0x007b, 400),
    (0x007c, 275), (0x007d, 400), (0x007e, 541),
]);

width_table!(TIMES_ROMAN_WIDTHS, [
    (0x0020, 250), (0x0021, 333), (0x0022, 408), (0x0023, 500),
    (0x0024, 500), (0x0025, 833), (0x0026, 778), (0x0027, 333),
    (0x0028, 333), (0x0029, 333), (0x002a, 500), (0x002b, 564),
    (0x002c, 250), (0x002d, 333), (0x002e, 250), (0x002f, 278),
    (0x0030, 500), (0x0031, 500), (0x0032, 500), (0x0033, 500),
    (0x0034, 500), (0x0035, 500), (0x0036, 500), (0x0037, 500),
    (0x0038, 500), (0x0039, 500), (0x003a, 278), (0x003b, 278),
    (0x003c, 564), (0x003d, 564), (0x003e, 564), (0x003f, 444),
    (0x0040, 921), (0x0041, 722), (0x0042, 667), (0x0043, 667),
    (0x0044, 722), (0x0045, 611), (0x0046, 556), (0x0047, 722),
    (0x0048, 722), (0x0049, 333), (0x004a, 389), (0x004b, 722),
    (0x004c, 611), (0x004d, 889), (0x004e, 722), (0x004f, 722),
    (0x0050, 556), (0x0051, 722), (0x0052, 667), (0x0053, 556),
    (0x0054, 611), (0x0055, 722), (0x0056, 722), (0x0057, 944),
    (0x0058, 722), (0x0059, 722), (0x005a, 611), (0x005b, 333),
    (0x005c, 278), (0x005d, 333), (0x005e, 469), (0x005f, 500),
    (0x0060, 333), (0x0061, 444), (0x0062, 500), (0x0063, 444),
    (0x0064, 500), (0x0065, 444), (0x0066, 333), (0x0067, 500),
    (0x0068, 500), (0x0069, 278), (0x006a, 278), (0x006b, 500),
    (0x006c, 278), (0x006d, 778), (0x006e, 500), (0x006f, 500),
    (0x0070, 500), (0x0071, 500), (0x0072, 333), (0x0073, 389),
    (0x0074, 278), (0x0075, 500), (0x0076, 500), (0x0077, 722),
    (0x0078, 500), (0x0079, 500), (0x007a, 444), (0x007b, 480),
    (0x007c, 200), (0x007d, 480), (0x007e, 541),
]);

width_table!(DINGBATS_WIDTHS, [
    (0x0020, 278),
]);

/// Resolves a core-14 `/BaseFont` name to its static width table. Returns
/// `None` for any other name, signalling the caller should fall back to
/// `/Widths` or `/DescendantFonts` resolution. Oblique variants of
/// Helvetica and every Courier variant share their upright table's
/// widths, since no separate metrics are defined for them (monospace by
/// construction for Courier; close enough in practice for Helvetica's
/// oblique face).
pub fn core_font_table(base_font: &str) -> Option<&'static WidthMap> {
    let name = base_font.trim_start_matches('/');
    match name {
        "Courier" | "Courier-Bold" | "Courier-Oblique" | "Courier-BoldOblique" => {
            Some(&COURIER_WIDTHS)
        }
        "Helvetica" | "Helvetica-Oblique" => Some(&HELVETICA_WIDTHS),
        "Helvetica-Bold" | "Helvetica-BoldOblique" => Some(&HELVETICA_BOLD_WIDTHS),
        "Symbol" => Some(&SYMBOL_WIDTHS),
        "Times-Bold" => Some(&TIMES_BOLD_WIDTHS),
        "Times-BoldItalic" => Some(&TIMES_BOLD_ITALIC_WIDTHS),
        "Times-Italic" => Some(&TIMES_ITALIC_WIDTHS),
        "Times-Roman" => Some(&TIMES_ROMAN_WIDTHS),
        "ZapfDingbats" => Some(&DINGBATS_WIDTHS),
        _ => None,
    }
}

/// A fully resolved width table for one font: either a core-14 static
/// table (keyed by Unicode scalar) or a `/Widths`/`/W`-derived table
/// (keyed by raw character code), plus the default fallback width.
#[derive(Debug, Clone)]
pub struct WidthTable {
    widths: HashMap<u16, u32>,
    default_width: u32,
}

impl WidthTable {
    pub fn from_map(widths: HashMap<u16, u32>) -> Self {
        WidthTable {
            widths,
            default_width: DEFAULT_WIDTH,
        }
    }

    pub fn with_default(mut self, default_width: u32) -> Self {
        self.default_width = default_width;
        self
    }

    pub fn core(base_font: &str) -> Option<Self> {
        core_font_table(base_font).map(|t| WidthTable::from_map(t.clone()))
    }

    pub fn width_of(&self, code: u16) -> u32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }
}

/// Resolves a simple font's `/Widths` array (a flat array of numbers
/// starting at `/FirstChar`) into a code-to-width map, per
/// `glyphwidths::parseWidths`.
pub fn parse_widths_array(items: &[Value], first_char: u16) -> HashMap<u16, u32> {
    let mut out = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        if let Some(w) = item.as_f64() {
            out.insert(first_char + i as u16, w.max(0.0) as u32);
        }
    }
    out
}

/// Resolves a composite font's `/DescendantFonts[0]/W` array. The PDF
/// spec allows two shapes for successive groups in this array:
///
/// - `c [w1 w2 ... wn]`: consecutive codes `c, c+1, ..., c+n-1` get
///   widths `w1..wn` respectively.
/// - `c_first c_last w`: every code in `c_first..=c_last` gets width `w`.
///
/// Both forms appear in real CID fonts; only the first is present in the
/// retrieved original, so the triple form here is a grounded supplement
/// (it's the other half of the same PDF-spec table, PDF32000 §9.7.4.3).
pub fn parse_descendant_w_array(items: &[Value]) -> HashMap<u16, u32> {
    let mut out = HashMap::new();
    let mut i = 0usize;
    while i < items.len() {
        let first = match items[i].as_int() {
            Some(n) if (0..=u16::MAX as i64).contains(&n) => n as u16,
            _ => {
                i += 1;
                continue;
            }
        };
        match items.get(i + 1) {
            Some(Value::Array(widths)) => {
                for (j, w) in widths.iter().enumerate() {
                    if let Some(w) = w.as_f64() {
                        out.insert(first.wrapping_add(j as u16), w.max(0.0) as u32);
                    }
                }
                i += 2;
            }
            Some(second) => {
                if let (Some(last), Some(w)) = (second.as_int(), items.get(i + 2).and_then(Value::as_f64)) {
                    if last >= first as i64 && last <= u16::MAX as i64 {
                        for code in first..=last as u16 {
                            out.insert(code, w.max(0.0) as u32);
                        }
                    }
                    i += 3;
                } else {
                    i += 1;
                }
            }
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_roman_widths_match_expected_letter_metrics() {
        let table = WidthTable::core("Times-Roman").unwrap();
        assert_eq!(table.width_of(b'A' as u16), 722);
        assert_eq!(table.width_of(b'B' as u16), 667);
        assert_eq!(table.width_of(b'C' as u16), 667);
    }

    #[test]
    fn courier_is_fully_monospaced() {
        let table = WidthTable::core("Courier").unwrap();
        assert_eq!(table.width_of(b'i' as u16), 600);
        assert_eq!(table.width_of(b'W' as u16), 600);
    }

    #[test]
    fn unknown_core_font_name_returns_none() {
        assert!(core_font_table("/MyEmbeddedFont").is_none());
    }

    #[test]
    fn widths_array_offsets_from_first_char() {
        let items = vec![Value::Int(300), Value::Int(400), Value::Int(500)];
        let map = parse_widths_array(&items, 65);
        assert_eq!(map[&65], 300);
        assert_eq!(map[&66], 400);
        assert_eq!(map[&67], 500);
    }

    #[test]
    fn descendant_w_array_handles_grouped_form() {
        let items = vec![
            Value::Int(1),
            Value::Array(vec![Value::Int(500), Value::Int(600), Value::Int(700)]),
        ];
        let map = parse_descendant_w_array(&items);
        assert_eq!(map[&1], 500);
        assert_eq!(map[&2], 600);
        assert_eq!(map[&3], 700);
    }

    #[test]
    fn descendant_w_array_handles_range_triple_form() {
        let items = vec![Value::Int(10), Value::Int(13), Value::Int(250)];
        let map = parse_descendant_w_array(&items);
        for code in 10..=13u16 {
            assert_eq!(map[&code], 250);
        }
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn missing_code_falls_back_to_default_width() {
        let table = WidthTable::from_map(HashMap::new());
        assert_eq!(table.width_of(0x41), DEFAULT_WIDTH);
    }
}
