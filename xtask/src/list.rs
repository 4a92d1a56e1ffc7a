use ggml_dequant::{GGmlType, GGmlTypeSize};
use std::cmp::max;

#[derive(Args, Default)]
pub struct ListArgs {}

impl ListArgs {
    pub fn list(self) {
        const NAME: &str = "Type";
        const ID: &str = "Id";
        const BLOCK: &str = "Block";
        const BYTES: &str = "Bytes";
        const BPW: &str = "Bits/weight";

        let rows = GGmlType::ALL
            .iter()
            .map(|&ty| {
                let GGmlTypeSize {
                    block_size,
                    type_size,
                } = ty.size();
                [
                    ty.to_string(),
                    (ty as u32).to_string(),
                    block_size.to_string(),
                    type_size.to_string(),
                    format!("{:.4}", ty.bits_per_weight()),
                ]
            })
            .collect::<Vec<_>>();

        let mut widths = [NAME, ID, BLOCK, BYTES, BPW].map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = max(*w, cell.len());
            }
        }
        let [w0, w1, w2, w3, w4] = widths;

        let line = format!("+-{0:-<w0$}-+-{0:-<w1$}-+-{0:-<w2$}-+-{0:-<w3$}-+-{0:-<w4$}-+", "");
        println!("{line}");
        println!("| {NAME:^w0$} | {ID:^w1$} | {BLOCK:^w2$} | {BYTES:^w3$} | {BPW:^w4$} |");
        println!("{line}");
        for [name, id, block, bytes, bpw] in rows {
            println!("| {name:<w0$} | {id:>w1$} | {block:>w2$} | {bytes:>w3$} | {bpw:>w4$} |");
        }
        println!("{line}");
    }
}
