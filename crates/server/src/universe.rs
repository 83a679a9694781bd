//! Static stock universe: NSE large caps with their sectors

use persistence::repository::StockRecord;

/// Nifty 50 index, used as the relative-strength benchmark
pub const BENCHMARK_SYMBOL: &str = "^NSEI";

const EXCHANGE_SUFFIX: &str = ".NS";

/// (symbol, sector)
const UNIVERSE: &[(&str, Option<&str>)] = &[
    // Nifty 50
    ("RELIANCE.NS", Some("Oil & Gas")),
    ("TCS.NS", Some("IT")),
    ("HDFCBANK.NS", Some("Banking")),
    ("INFY.NS", Some("IT")),
    ("ICICIBANK.NS", Some("Banking")),
    ("HINDUNILVR.NS", Some("FMCG")),
    ("BHARTIARTL.NS", Some("Telecom")),
    ("SBIN.NS", Some("Banking")),
    ("KOTAKBANK.NS", Some("Banking")),
    ("BAJFINANCE.NS", Some("NBFC")),
    ("ITC.NS", Some("FMCG")),
    ("LICI.NS", Some("Insurance")),
    ("LT.NS", Some("Infrastructure")),
    ("HCLTECH.NS", Some("IT")),
    ("AXISBANK.NS", Some("Banking")),
    ("ASIANPAINT.NS", Some("Paints")),
    ("MARUTI.NS", Some("Auto")),
    ("SUNPHARMA.NS", Some("Pharma")),
    ("TITAN.NS", Some("Retail")),
    ("DMART.NS", Some("Retail")),
    ("ULTRACEMCO.NS", Some("Cement")),
    ("BAJAJFINSV.NS", Some("NBFC")),
    ("WIPRO.NS", Some("IT")),
    ("ONGC.NS", Some("Oil & Gas")),
    ("NTPC.NS", Some("Power")),
    ("NESTLEIND.NS", Some("FMCG")),
    ("TATAMOTORS.NS", Some("Auto")),
    ("M&M.NS", Some("Auto")),
    ("JSWSTEEL.NS", Some("Metals")),
    ("POWERGRID.NS", Some("Power")),
    ("TATASTEEL.NS", Some("Metals")),
    ("ADANIENT.NS", Some("Conglomerate")),
    ("ADANIPORTS.NS", Some("Infrastructure")),
    ("COALINDIA.NS", Some("Mining")),
    ("TECHM.NS", Some("IT")),
    ("HINDZINC.NS", Some("Metals")),
    ("LTIM.NS", Some("IT")),
    ("BAJAJ-AUTO.NS", Some("Auto")),
    ("SBILIFE.NS", Some("Insurance")),
    ("HDFCLIFE.NS", Some("Insurance")),
    ("BRITANNIA.NS", Some("FMCG")),
    ("INDUSINDBK.NS", Some("Banking")),
    ("GRASIM.NS", Some("Cement")),
    ("CIPLA.NS", Some("Pharma")),
    ("EICHERMOT.NS", Some("Auto")),
    ("DRREDDY.NS", Some("Pharma")),
    ("DIVISLAB.NS", Some("Pharma")),
    ("APOLLOHOSP.NS", Some("Healthcare")),
    ("BPCL.NS", Some("Oil & Gas")),
    ("HEROMOTOCO.NS", Some("Auto")),
    // Nifty Next 50
    ("ADANIGREEN.NS", Some("Power")),
    ("ADANIPOWER.NS", Some("Power")),
    ("AMBUJACEM.NS", Some("Cement")),
    ("ATGL.NS", Some("Oil & Gas")),
    ("AUROPHARMA.NS", Some("Pharma")),
    ("BANDHANBNK.NS", Some("Banking")),
    ("BANKBARODA.NS", Some("Banking")),
    ("BERGEPAINT.NS", Some("Paints")),
    ("BIOCON.NS", Some("Pharma")),
    ("BOSCHLTD.NS", Some("Auto Ancillary")),
    ("CANBK.NS", Some("Banking")),
    ("CHOLAFIN.NS", Some("NBFC")),
    ("COLPAL.NS", Some("FMCG")),
    ("DABUR.NS", Some("FMCG")),
    ("DLF.NS", Some("Real Estate")),
    ("GAIL.NS", Some("Oil & Gas")),
    ("GODREJCP.NS", Some("FMCG")),
    ("HAVELLS.NS", Some("Consumer Durables")),
    ("HINDPETRO.NS", Some("Oil & Gas")),
    ("ICICIPRULI.NS", Some("Insurance")),
    ("IDEA.NS", Some("Telecom")),
    ("IDFCFIRSTB.NS", Some("Banking")),
    ("IGL.NS", Some("Oil & Gas")),
    ("INDHOTEL.NS", Some("Hotels")),
    ("INDIGO.NS", Some("Aviation")),
    ("IOC.NS", Some("Oil & Gas")),
    ("IRCTC.NS", Some("Travel")),
    ("JINDALSTEL.NS", Some("Metals")),
    ("JSWENERGY.NS", Some("Power")),
    ("JUBLFOOD.NS", Some("Food & Beverages")),
    ("LALPATHLAB.NS", Some("Healthcare")),
    ("LUPIN.NS", Some("Pharma")),
    ("MCDOWELL-N.NS", Some("FMCG")),
    ("MOTHERSON.NS", Some("Auto Ancillary")),
    ("MUTHOOTFIN.NS", Some("NBFC")),
    ("NAUKRI.NS", Some("IT")),
    ("NMDC.NS", Some("Mining")),
    ("OBEROIRLTY.NS", Some("Real Estate")),
    ("OFSS.NS", None),
    ("PAGEIND.NS", Some("Retail")),
    ("PEL.NS", None),
    ("PETRONET.NS", Some("Oil & Gas")),
    ("PFC.NS", Some("NBFC")),
    ("PIDILITIND.NS", Some("Chemicals")),
    ("PIIND.NS", Some("Chemicals")),
    ("PNB.NS", Some("Banking")),
    ("POLYCAB.NS", Some("Consumer Durables")),
    ("RECLTD.NS", Some("NBFC")),
    ("SAIL.NS", Some("Metals")),
    ("SBICARD.NS", Some("NBFC")),
    ("SHREECEM.NS", Some("Cement")),
    ("SIEMENS.NS", Some("Engineering")),
    ("SRF.NS", Some("Chemicals")),
    ("TATACOMM.NS", Some("Telecom")),
    ("TATACONSUM.NS", Some("FMCG")),
    ("TATAPOWER.NS", Some("Power")),
    ("TORNTPHARM.NS", Some("Pharma")),
    ("TRENT.NS", Some("Retail")),
    ("UNIONBANK.NS", None),
    ("UPL.NS", None),
    ("VBL.NS", Some("FMCG")),
    ("VEDL.NS", Some("Metals")),
    ("VOLTAS.NS", Some("Consumer Durables")),
    ("YESBANK.NS", Some("Banking")),
    ("ZOMATO.NS", Some("Food Tech")),
];

pub fn symbols() -> Vec<String> {
    UNIVERSE.iter().map(|(s, _)| s.to_string()).collect()
}

pub fn sector_for(symbol: &str) -> Option<&'static str> {
    UNIVERSE
        .iter()
        .find(|(s, _)| *s == symbol)
        .and_then(|(_, sector)| *sector)
}

/// Ticker without the exchange suffix, used when no company name is known
pub fn display_name(symbol: &str) -> String {
    symbol
        .strip_suffix(EXCHANGE_SUFFIX)
        .unwrap_or(symbol)
        .to_string()
}

/// Upper-case and add the exchange suffix to bare tickers (`infy` → `INFY.NS`)
pub fn normalize_symbol(symbol: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    if symbol.starts_with('^') || symbol.contains('.') {
        symbol
    } else {
        format!("{symbol}{EXCHANGE_SUFFIX}")
    }
}

/// Master-list rows for a set of symbols
pub fn stock_records(symbols: &[String]) -> Vec<StockRecord> {
    symbols
        .iter()
        .map(|symbol| {
            StockRecord::new(
                symbol.clone(),
                Some(display_name(symbol)),
                sector_for(symbol).map(str::to_string),
            )
        })
        .collect()
}
