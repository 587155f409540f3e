// ═══════════════════════════════════════════════════════════════════
// Model Tests: transactions, asset classes, settings, column schema,
// periods, cache keys
// ═══════════════════════════════════════════════════════════════════

use chrono::NaiveDate;

use portfolio_tracker_core::models::asset::AssetClass;
use portfolio_tracker_core::models::dividend::{DividendPayment, DividendTotal, MonthlyDividend, Period, PeriodKey};
use portfolio_tracker_core::models::ledger::LedgerEntry;
use portfolio_tracker_core::models::position::{HistoricalPosition, MonthlyPosition, MonthlyTotal, ValuedPosition};
use portfolio_tracker_core::models::price::cache_key;
use portfolio_tracker_core::models::schema::{Cell, FieldFormat, NumberLocale, TableRow};
use portfolio_tracker_core::models::settings::Settings;
use portfolio_tracker_core::models::transaction::{OperationKind, Transaction};

fn make_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// OperationKind / Transaction
// ═══════════════════════════════════════════════════════════════════

mod operation_kind {
    use super::*;

    #[test]
    fn parse_labels() {
        assert_eq!(OperationKind::parse("Compra"), Some(OperationKind::Buy));
        assert_eq!(OperationKind::parse(" VENDA "), Some(OperationKind::Sell));
        assert_eq!(OperationKind::parse("buy"), Some(OperationKind::Buy));
        assert_eq!(OperationKind::parse("Sell"), Some(OperationKind::Sell));
        assert_eq!(OperationKind::parse("Subscrição"), None);
    }

    #[test]
    fn from_str() {
        assert_eq!("compra".parse::<OperationKind>().unwrap(), OperationKind::Buy);
        assert!("split".parse::<OperationKind>().is_err());
    }

    #[test]
    fn buys_sort_before_sells() {
        assert!(OperationKind::Buy < OperationKind::Sell);
    }

    #[test]
    fn signed_quantity() {
        assert_eq!(OperationKind::Buy.signed_quantity(3.0), 3.0);
        assert_eq!(OperationKind::Sell.signed_quantity(3.0), -3.0);
        assert_eq!(OperationKind::Sell.signed_quantity(-3.0), -3.0);
    }

    #[test]
    fn display() {
        assert_eq!(OperationKind::Buy.to_string(), "Buy");
        assert_eq!(OperationKind::Sell.to_string(), "Sell");
    }
}

mod transaction {
    use super::*;

    #[test]
    fn constructor_normalizes_ticker_and_sign() {
        let t = Transaction::sell(make_date(2021, 1, 1), " hglg11 ", 5.0, 160.0);
        assert_eq!(t.ticker, "HGLG11");
        assert_eq!(t.quantity, -5.0);
        assert_eq!(t.operation_cost(), -800.0);
    }

    #[test]
    fn builders() {
        let t = Transaction::buy(make_date(2021, 1, 1), "PETR4", 1.0, 30.0)
            .with_broker("XP")
            .with_exchange("B3")
            .with_sequence(7);
        assert_eq!(t.broker.as_deref(), Some("XP"));
        assert_eq!(t.exchange.as_deref(), Some("B3"));
        assert_eq!(t.sequence, 7);
    }

    #[test]
    fn serde_json_roundtrip_with_defaults() {
        let json = r#"{"date":"2021-01-01","ticker":"PETR4","operation":"Buy","quantity":1.0,"unit_price":30.0}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert!(t.broker.is_none());
        assert_eq!(t.sequence, 0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// AssetClass
// ═══════════════════════════════════════════════════════════════════

mod asset_class {
    use super::*;

    #[test]
    fn env_vars() {
        assert_eq!(AssetClass::Stock.env_var(), "STOCKS_TRANSACTIONS");
        assert_eq!(AssetClass::RealEstateFund.env_var(), "FII_TRANSACTIONS");
        assert_eq!(AssetClass::MutualFund.env_var(), "FUNDS_TRANSACTIONS");
    }

    #[test]
    fn default_files() {
        assert!(AssetClass::RealEstateFund.default_file().ends_with("fii_transactions.csv"));
    }

    #[test]
    fn display() {
        assert_eq!(AssetClass::RealEstateFund.to_string(), "RealEstateFund");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════

mod settings {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.loader.delimiter, ';');
        assert_eq!(s.loader.decimal_separator, ',');
        assert_eq!(s.loader.thousands_separator, Some('.'));
        assert_eq!(s.loader.date_format, "%d/%m/%Y");
        assert_eq!(s.cache.quote_ttl(), chrono::Duration::days(1));
        assert_eq!(s.cache.dividend_ttl(AssetClass::Stock), chrono::Duration::days(7));
        assert_eq!(s.cache.dividend_ttl(AssetClass::RealEstateFund), chrono::Duration::days(15));
        assert!(s.cache.path.is_none());
    }

    #[test]
    fn from_json_partial() {
        let s = Settings::from_json(
            r#"{"cache": {"quote_ttl_days": 2, "stock_dividend_ttl_days": 7, "fund_dividend_ttl_days": 30, "path": "/tmp/c.ptrc"},
                "transaction_files": {"Stock": "my_stocks.csv"}}"#,
        )
        .unwrap();
        assert_eq!(s.cache.quote_ttl(), chrono::Duration::days(2));
        assert_eq!(s.cache.dividend_ttl(AssetClass::RealEstateFund), chrono::Duration::days(30));
        assert_eq!(s.cache.path.as_deref(), Some("/tmp/c.ptrc"));
        assert_eq!(s.loader.delimiter, ';');
        assert_eq!(s.transaction_file(AssetClass::Stock), "my_stocks.csv");
        assert_eq!(
            s.transaction_file(AssetClass::RealEstateFund),
            AssetClass::RealEstateFund.default_file()
        );
    }

    #[test]
    fn from_json_fills_missing_section_fields() {
        let s = Settings::from_json(r#"{"cache": {"path": "x"}, "loader": {"delimiter": ","}}"#).unwrap();
        assert_eq!(s.cache.path.as_deref(), Some("x"));
        assert_eq!(s.cache.quote_ttl_days, 1);
        assert_eq!(s.cache.dividend_ttl(AssetClass::Stock), chrono::Duration::days(7));
        assert_eq!(s.loader.delimiter, ',');
        assert_eq!(s.loader.decimal_separator, ',');
        assert_eq!(s.loader.date_format, "%d/%m/%Y");
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(Settings::from_json("not json").is_err());
    }

    #[test]
    fn from_env_reads_transaction_paths() {
        std::env::set_var("FUNDS_TRANSACTIONS", "/data/funds.csv");
        let s = Settings::from_env();
        std::env::remove_var("FUNDS_TRANSACTIONS");
        assert_eq!(s.transaction_file(AssetClass::MutualFund), "/data/funds.csv");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Column schema
// ═══════════════════════════════════════════════════════════════════

mod schema {
    use super::*;

    #[test]
    fn currency_rendering() {
        let locale = NumberLocale::default();
        assert_eq!(
            FieldFormat::Currency.render(&Cell::Number(1234.5), &locale),
            "R$ 1.234,50"
        );
        assert_eq!(
            FieldFormat::Currency.render(&Cell::Number(-1234567.891), &locale),
            "R$ -1.234.567,89"
        );
        assert_eq!(FieldFormat::Currency.render(&Cell::Number(0.0), &locale), "R$ 0,00");
    }

    #[test]
    fn percentage_rendering() {
        let locale = NumberLocale::default();
        assert_eq!(
            FieldFormat::Percentage.render(&Cell::Number(28.048780), &locale),
            "28,05%"
        );
    }

    #[test]
    fn plain_and_missing() {
        let locale = NumberLocale::default();
        assert_eq!(FieldFormat::Plain.render(&Cell::Text("AAA11".into()), &locale), "AAA11");
        assert_eq!(FieldFormat::Plain.render(&Cell::Integer(2020), &locale), "2020");
        assert_eq!(
            FieldFormat::Plain.render(&Cell::Date(make_date(2020, 3, 31)), &locale),
            "2020-03-31"
        );
        assert_eq!(FieldFormat::Currency.render(&Cell::Missing, &locale), "");
    }

    #[test]
    fn custom_locale() {
        let locale = NumberLocale {
            decimal_separator: '.',
            thousands_separator: Some(','),
            currency_symbol: "$".into(),
        };
        assert_eq!(FieldFormat::Currency.render(&Cell::Number(9876.5), &locale), "$ 9,876.50");
        assert_eq!(locale.format_number(999.999, 2), "1,000.00");
    }

    #[test]
    fn tiny_negatives_render_without_sign() {
        assert_eq!(NumberLocale::default().format_number(-0.001, 2), "0,00");
    }

    #[test]
    fn every_row_type_has_matching_cells() {
        fn check<R: TableRow>(row: &R) {
            assert_eq!(R::fields().len(), row.cells().len());
        }

        let ledger_entry = LedgerEntry {
            date: make_date(2020, 1, 1),
            ticker: "AAA11".into(),
            operation: OperationKind::Buy,
            quantity: 1.0,
            unit_price: 10.0,
            broker: None,
            exchange: None,
            sequence: 0,
            operation_cost: 10.0,
            adjusted_quantity: 1.0,
            adjusted_cost: 10.0,
            adjusted_unit_price: 10.0,
        };
        check(&ledger_entry);

        check(&MonthlyPosition {
            date: make_date(2020, 1, 31),
            ticker: "AAA11".into(),
            broker: None,
            exchange: None,
            adjusted_quantity: 1.0,
            adjusted_cost: 10.0,
            adjusted_unit_price: 10.0,
            year: 2020,
            month: 1,
        });

        let valued = ValuedPosition {
            ticker: "AAA11".into(),
            broker: Some("XP".into()),
            exchange: None,
            adjusted_quantity: 1.0,
            adjusted_cost: 10.0,
            adjusted_unit_price: 10.0,
            current_quote: None,
            current_value: None,
            gain_loss_pct: None,
        };
        check(&valued);
        assert_eq!(valued.cells()[1], Cell::Missing);
        assert_eq!(valued.cells()[8], Cell::Missing);

        check(&HistoricalPosition {
            date: make_date(2020, 1, 2),
            ticker: "AAA11".into(),
            adjusted_quantity: 1.0,
            adjusted_cost: 10.0,
            adjusted_unit_price: 10.0,
            close: 11.0,
            position_value: 11.0,
        });

        check(&MonthlyTotal {
            date: make_date(2020, 1, 31),
            adjusted_cost: 10.0,
        });

        check(&MonthlyDividend {
            date: make_date(2020, 1, 31),
            ticker: "AAA11".into(),
            year: 2020,
            month: 1,
            adjusted_quantity: 1.0,
            adjusted_cost: 10.0,
            adjusted_unit_price: 10.0,
            dividend_per_unit: 0.1,
            pay_date: None,
            amount_received: 0.1,
            current_quote: Some(11.0),
            yield_on_cost: Some(1.0),
            dividend_yield: Some(0.9),
        });

        check(&DividendPayment {
            date: make_date(2020, 1, 15),
            ticker: "PETR4".into(),
            units: 1.0,
            amount_per_unit: 0.5,
            amount_received: 0.5,
        });

        check(&DividendTotal {
            period: PeriodKey::Year(2020),
            ticker: "PETR4".into(),
            amount_received: 0.5,
        });
    }

    #[test]
    fn formats_are_attached_to_columns() {
        let formats: Vec<(&str, FieldFormat)> = ValuedPosition::fields()
            .iter()
            .map(|f| (f.name, f.format))
            .collect();
        assert!(formats.contains(&("Current Value", FieldFormat::Currency)));
        assert!(formats.contains(&("Gain/Loss Pct", FieldFormat::Percentage)));
        assert!(formats.contains(&("Ticker", FieldFormat::Plain)));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Periods and cache keys
// ═══════════════════════════════════════════════════════════════════

mod periods {
    use super::*;

    #[test]
    fn keys_and_display() {
        let date = make_date(2020, 3, 31);
        assert_eq!(PeriodKey::of(Period::Year, date), PeriodKey::Year(2020));
        assert_eq!(PeriodKey::of(Period::Month, date).to_string(), "2020-03");
        assert_eq!(PeriodKey::Year(2021).to_string(), "2021");
    }

    #[test]
    fn ordering() {
        assert!(PeriodKey::Month { year: 2020, month: 12 } < PeriodKey::Month { year: 2021, month: 1 });
        assert!(PeriodKey::Year(2020) < PeriodKey::Year(2021));
    }
}

mod cache_keys {
    use super::*;

    #[test]
    fn normalized_key() {
        assert_eq!(
            cache_key("hglg11", Some("b3"), Some(make_date(2020, 3, 10)), None),
            "HGLG11|B3|2020-03-10|-"
        );
        assert_eq!(cache_key("AAPL", None, None, None), "AAPL|-|-|-");
    }
}
