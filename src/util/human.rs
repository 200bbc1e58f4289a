/// Format a KB/s figure into a human-readable rate: "12.5 MB/s"
pub fn fmt_kb_rate(kb_per_sec: f64) -> String {
    fmt_bytes_f(kb_per_sec * 1024.0) + "/s"
}

/// Format a raw byte count into a human-readable string: "12.5 MB"
pub fn fmt_bytes(bytes: i64) -> String {
    fmt_bytes_f(bytes.max(0) as f64)
}

fn fmt_bytes_f(b: f64) -> String {
    const TB: f64 = 1_099_511_627_776.0;
    const GB: f64 = 1_073_741_824.0;
    const MB: f64 = 1_048_576.0;
    const KB: f64 = 1_024.0;
    if b >= TB      { format!("{:.1} TB", b / TB) }
    else if b >= GB { format!("{:.1} GB", b / GB) }
    else if b >= MB { format!("{:.1} MB", b / MB) }
    else if b >= KB { format!("{:.1} KB", b / KB) }
    else            { format!("{:.0} B",  b) }
}

/// Mount age: "45s", "12m", "5h", "3d"
pub fn fmt_age(secs: i64) -> String {
    let s = secs.max(0);
    if s < 60           { format!("{}s", s) }
    else if s < 3_600   { format!("{}m", s / 60) }
    else if s < 86_400  { format!("{}h", s / 3_600) }
    else                { format!("{}d", s / 86_400) }
}
