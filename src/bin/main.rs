use parse_probes::{LineAxis, LineCuts, LineData, ProbeData};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "parse-probes", about = "Parsing flow solver probe extracts")]
struct Opt {
    /// Path to the extracts repository
    #[structopt(long, default_value = ".")]
    path: String,
    /// Probe identifier
    #[structopt(short, long)]
    probe: Option<String>,
    /// Line identifier
    #[structopt(short, long)]
    line: Option<String>,
    /// Variables regular expression filter
    #[structopt(short, long)]
    variable: Option<String>,
    /// Extract start time
    #[structopt(short, long)]
    start: Option<f64>,
    /// Extract end time
    #[structopt(short, long)]
    end: Option<f64>,
    /// Keep every n-th time sample
    #[structopt(short, long)]
    rate: Option<usize>,
    /// Correlation lags
    #[structopt(long, default_value = "40")]
    lags: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    if let Some(id) = opt.line {
        let mut loader = LineData::loader().data_path(&opt.path).line(&id);
        if let Some(endpoints) = LineCuts::default().get(&id) {
            loader = loader.endpoints(*endpoints);
        }
        if let Some(arg) = opt.variable {
            loader = loader.header_filter(arg);
        }
        if let Some(arg) = opt.start {
            loader = loader.start_time(arg);
        }
        if let Some(arg) = opt.end {
            loader = loader.end_time(arg);
        }
        if let Some(arg) = opt.rate {
            loader = loader.sampling_rate(arg);
        }
        let mut line = loader.load()?;
        line.derive_variables();
        println!(
            "Line {}: {} samples x {} stations",
            id,
            line.len(),
            line.stations()
        );
        let stride = (line.stations() / 8).max(1);
        let temporal = line.temporal_series("U-X", stride, opt.lags)?;
        let scales = LineData::ensemble(&temporal)?.length_scales()?;
        println!("U-X temporal scales: {}", scales);
        if let Ok(spatial) = line.spatial_series("U-X", opt.rate.unwrap_or(1), LineAxis::Y, opt.lags)
        {
            let scales = LineData::ensemble(&spatial)?.length_scales()?;
            println!("U-X spatial scales: {}", scales);
        }
    } else {
        let mut loader = ProbeData::loader()
            .data_path(&opt.path)
            .probe(opt.probe.as_deref().unwrap_or("p00"));
        if let Some(arg) = opt.variable {
            loader = loader.header_filter(arg);
        }
        if let Some(arg) = opt.start {
            loader = loader.start_time(arg);
        }
        if let Some(arg) = opt.end {
            loader = loader.end_time(arg);
        }
        if let Some(arg) = opt.rate {
            loader = loader.sampling_rate(arg);
        }
        let mut probe = loader.load()?;
        probe.derive_variables();
        probe.summary();
        match probe.series("U-X", opt.lags).and_then(|s| Ok(s.length_scales()?)) {
            Ok(scales) => println!("U-X scales: {}", scales),
            Err(e) => log::warn!("no length scales: {}", e),
        }
    }

    Ok(())
}
