//! Command handlers for the ledger shell.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    chart::AccountType,
    currency::{CurrencyCode, Money},
    journal::{EntryLine, EntryRequest, JournalEntry, TransactionInput, TransactionKind},
    statements::{
        BalanceSheet, BalanceSheetSide, CashFlowStatement, IncomeStatement, StatementSection,
        TrialBalance,
    },
    time::{parse_date, Period},
    utils::build_info,
};

use super::{
    errors::CommandError,
    output,
    registry::{CommandEntry, CommandGroup, CommandRegistry},
    shell_context::ShellContext,
    CommandResult,
};

const LABEL_WIDTH: usize = 40;

pub(crate) fn register_all(registry: &mut CommandRegistry) {
    use CommandGroup::*;
    let entries = [
        CommandEntry::new("help", Session, "Show available commands", "help [command]", cmd_help)
            .with_aliases(&["?"]),
        CommandEntry::new("user", Session, "Show or switch the active user", "user [id]", cmd_user),
        CommandEntry::new(
            "accounts",
            Journal,
            "List the chart of accounts",
            "accounts [asset|liability|equity|revenue|expense]",
            cmd_accounts,
        )
        .with_aliases(&["coa"]),
        CommandEntry::new(
            "post",
            Journal,
            "Post a journal entry; lines are CODE:dr:AMOUNT or CODE:cr:AMOUNT",
            "post <date|today> <description> <line> <line>... [--ref <reference>]",
            cmd_post,
        ),
        CommandEntry::new(
            "record",
            Journal,
            "Post a categorised transaction through the posting rules",
            "record <income|expense> <category> <amount> [date] [description...]",
            cmd_record,
        ),
        CommandEntry::new(
            "entries",
            Journal,
            "List journal entries",
            "entries [start end]",
            cmd_entries,
        )
        .with_aliases(&["journal"]),
        CommandEntry::new("show", Journal, "Show one journal entry", "show <id|reference>", cmd_show),
        CommandEntry::new(
            "describe",
            Journal,
            "Change an entry's description",
            "describe <id|reference> <text...>",
            cmd_describe,
        ),
        CommandEntry::new(
            "reverse",
            Journal,
            "Reverse and remove a journal entry",
            "reverse <id|reference>",
            cmd_reverse,
        ),
        CommandEntry::new(
            "balance",
            Reports,
            "Balance of one account at the close of a day",
            "balance <code> [as-of]",
            cmd_balance,
        )
        .with_aliases(&["bal"]),
        CommandEntry::new("tb", Reports, "Trial balance for a month", "tb [YYYY-MM]", cmd_trial_balance),
        CommandEntry::new("bs", Reports, "Balance sheet", "bs [as-of]", cmd_balance_sheet),
        CommandEntry::new("is", Reports, "Income statement", "is <start> <end>", cmd_income_statement),
        CommandEntry::new("cf", Reports, "Cash-flow statement", "cf <start> <end>", cmd_cash_flow),
        CommandEntry::new(
            "verify",
            Maintenance,
            "Compare stored buckets with the journal entries",
            "verify",
            cmd_verify,
        ),
        CommandEntry::new(
            "rebuild",
            Maintenance,
            "Recompute the ledger from the journal entries",
            "rebuild",
            cmd_rebuild,
        ),
        CommandEntry::new("version", Maintenance, "Show build information", "version", cmd_version),
        CommandEntry::new("exit", Session, "Leave the shell", "exit", cmd_exit).with_aliases(&["quit"]),
    ];
    for entry in entries {
        registry.register(entry);
    }
}

fn cmd_help(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if let Some(name) = args.first() {
        let entry = context
            .registry
            .resolve(name)
            .ok_or_else(|| CommandError::usage(format!("no command named `{name}`")))?;
        output::info(format!("{} - {}", entry.name, entry.description));
        output::info(format!("usage: {}", entry.usage));
        if !entry.aliases.is_empty() {
            output::info(format!("aliases: {}", entry.aliases.join(", ")));
        }
        return Ok(());
    }
    for group in CommandGroup::ALL {
        let entries = context.registry.in_group(group);
        if entries.is_empty() {
            continue;
        }
        output::section(group.title());
        for entry in entries {
            println!("  {:<10} {}", entry.name, entry.description);
        }
    }
    Ok(())
}

fn cmd_user(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    match args.first() {
        Some(id) if !id.trim().is_empty() => {
            context.user_id = id.trim().to_string();
            output::success(format!("Active user: {}", context.user_id));
        }
        _ => output::info(format!("Active user: {}", context.user_id)),
    }
    Ok(())
}

fn cmd_accounts(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let filter = args.first().map(|raw| parse_account_type(raw)).transpose()?;
    output::section("Chart of Accounts");
    for account in context.engine.accounts() {
        if filter.is_some_and(|kind| kind != account.account_type) {
            continue;
        }
        let contra = if account.is_contra { " (contra)" } else { "" };
        println!(
            "  {:<6} {:<40} {:<10} {}{}",
            account.code,
            account.name,
            account.account_type,
            account.category.label(),
            contra
        );
    }
    Ok(())
}

fn cmd_post(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (args, reference) = take_flag(args, "--ref")?;
    let [date, description, lines @ ..] = args.as_slice() else {
        return Err(CommandError::usage(
            "usage: post <date|today> <description> <line> <line>... [--ref <reference>]",
        ));
    };
    if lines.is_empty() {
        return Err(CommandError::usage("post needs at least one line"));
    }
    let mut request = EntryRequest::new(*description).dated(resolve_date(context, date)?);
    if let Some(reference) = reference {
        request = request.reference(reference);
    }
    for line in lines {
        request = request.line(parse_line(line)?);
    }
    let entry = context.engine.post_entry(&context.user_id, request)?;
    output::success(format!("Posted {} [{}]", entry.reference, entry.id));
    Ok(())
}

fn cmd_record(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [kind, category, amount, rest @ ..] = args else {
        return Err(CommandError::usage(
            "usage: record <income|expense> <category> <amount> [date] [description...]",
        ));
    };
    let kind = TransactionKind::parse(kind).ok_or_else(|| {
        CommandError::usage(format!("`{kind}` is not a transaction kind (income or expense)"))
    })?;
    let (date, words) = match rest.split_first() {
        Some((first, words)) if looks_like_date(first) => {
            (Some(resolve_date(context, first)?), words)
        }
        _ => (None, rest),
    };
    let description = if words.is_empty() {
        format!("{kind}: {category}")
    } else {
        words.join(" ")
    };
    let input = TransactionInput {
        kind,
        category: category.to_string(),
        amount: parse_amount(amount)?,
        description,
        date,
        reference: None,
    };
    let entry = context.engine.record_transaction(&context.user_id, input)?;
    output::success(format!("Posted {} [{}]", entry.reference, entry.id));
    Ok(())
}

fn cmd_entries(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let range = match args {
        [] => None,
        [start, end] => Some((resolve_date(context, start)?, resolve_date(context, end)?)),
        _ => return Err(CommandError::usage("usage: entries [start end]")),
    };
    let entries = context.engine.list_entries(&context.user_id, range)?;
    if entries.is_empty() {
        output::info("No journal entries.");
        return Ok(());
    }
    let currency = context.config.currency.clone();
    output::section(format!("Journal Entries ({})", context.user_id));
    for entry in &entries {
        println!(
            "  {}  {:<22} {:>16}  {}  [{}]",
            entry.date,
            entry.reference,
            Money::new(entry.amount(), &currency).to_string(),
            entry.description,
            short_id(entry.id)
        );
    }
    Ok(())
}

fn cmd_show(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [needle] = args else {
        return Err(CommandError::usage("usage: show <id|reference>"));
    };
    let entry = find_entry(context, needle)?;
    render_entry(&entry, &context.config.currency);
    Ok(())
}

fn cmd_describe(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [needle, words @ ..] = args else {
        return Err(CommandError::usage("usage: describe <id|reference> <text...>"));
    };
    if words.is_empty() {
        return Err(CommandError::usage("describe needs the new description"));
    }
    let id = find_entry(context, needle)?.id;
    let entry = context
        .engine
        .edit_description(&context.user_id, id, words.join(" "))?;
    output::success(format!("Updated {}: {}", entry.reference, entry.description));
    Ok(())
}

fn cmd_reverse(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [needle] = args else {
        return Err(CommandError::usage("usage: reverse <id|reference>"));
    };
    let entry = find_entry(context, needle)?;
    if !context.confirm(&format!("Reverse {} ({})?", entry.reference, entry.description))? {
        output::info("Reversal cancelled.");
        return Ok(());
    }
    let reversed = context.engine.reverse_entry(&context.user_id, entry.id)?;
    output::success(format!("Reversed {}", reversed.reference));
    Ok(())
}

fn cmd_balance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (code, as_of) = match args {
        [code] => (*code, None),
        [code, date] => (*code, Some(resolve_date(context, date)?)),
        _ => return Err(CommandError::usage("usage: balance <code> [as-of]")),
    };
    let account = context.engine.chart().lookup(code)?.clone();
    let balance = context
        .engine
        .account_balance(&context.user_id, &account.code, as_of)?;
    output::info(format!(
        "{} {}: {} ({} normal)",
        account.code,
        account.name,
        Money::new(balance, &context.config.currency),
        account.normal_balance()
    ));
    Ok(())
}

fn cmd_trial_balance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (year, month) = match args {
        [] => (None, None),
        [period] => {
            let period = parse_period(period)?;
            (Some(period.year), Some(period.month))
        }
        _ => return Err(CommandError::usage("usage: tb [YYYY-MM]")),
    };
    let tb = context.engine.trial_balance(&context.user_id, year, month)?;
    render_trial_balance(&tb, &context.config.currency);
    Ok(())
}

fn cmd_balance_sheet(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let as_of = match args {
        [] => None,
        [date] => Some(resolve_date(context, date)?),
        _ => return Err(CommandError::usage("usage: bs [as-of]")),
    };
    let sheet = context.engine.balance_sheet(&context.user_id, as_of)?;
    render_balance_sheet(&sheet, &context.config.currency);
    Ok(())
}

fn cmd_income_statement(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [start, end] = args else {
        return Err(CommandError::usage("usage: is <start> <end>"));
    };
    let (start, end) = (resolve_date(context, start)?, resolve_date(context, end)?);
    let statement = context
        .engine
        .income_statement(&context.user_id, start, end)?;
    render_income_statement(&statement, &context.config.currency);
    Ok(())
}

fn cmd_cash_flow(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [start, end] = args else {
        return Err(CommandError::usage("usage: cf <start> <end>"));
    };
    let (start, end) = (resolve_date(context, start)?, resolve_date(context, end)?);
    let statement = context
        .engine
        .cash_flow_statement(&context.user_id, start, end)?;
    render_cash_flow(&statement, &context.config.currency);
    Ok(())
}

fn cmd_verify(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let report = context.engine.verify(&context.user_id)?;
    if report.is_clean() {
        output::success(format!(
            "Ledger is consistent: {} entries, {} buckets checked.",
            report.entries_scanned, report.buckets_checked
        ));
        return Ok(());
    }
    for drift in &report.drift {
        output::warning(format!(
            "{} {}: stored {:.2}, expected {:.2}",
            drift.key.account_code,
            drift.key.period,
            drift.stored.balance,
            drift.expected.balance
        ));
    }
    for id in &report.unresolved_entries {
        output::warning(format!("Entry {id} references accounts missing from the chart"));
    }
    output::hint("Run `rebuild` to recompute the ledger from its journal entries.");
    Ok(())
}

fn cmd_rebuild(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    if !context.confirm("Rebuild replaces every bucket for this user. Continue?")? {
        output::info("Rebuild cancelled.");
        return Ok(());
    }
    let outcome = context.engine.rebuild(&context.user_id)?;
    if let Some(path) = &outcome.backup {
        output::info(format!("Backup written to {}", path.display()));
    }
    output::success(format!(
        "Rebuilt {} buckets; corrected {}.",
        outcome.buckets_written,
        outcome.report.drift.len()
    ));
    Ok(())
}

fn cmd_version(_context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    output::info(build_info::current().summary());
    Ok(())
}

fn cmd_exit(_context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    Err(CommandError::ExitRequested)
}

fn render_entry(entry: &JournalEntry, currency: &CurrencyCode) {
    output::section(format!("{} {}", entry.reference, entry.description));
    println!("  id:   {}", entry.id);
    println!("  date: {}", entry.date);
    for line in &entry.lines {
        let (side, amount) = if line.debit != 0.0 {
            ("Dr", line.debit)
        } else {
            ("Cr", line.credit)
        };
        println!(
            "  {} {:<6} {:>18}  {}",
            side,
            line.account_code,
            Money::new(amount, currency).to_string(),
            line.description.as_deref().unwrap_or("")
        );
    }
}

fn render_trial_balance(tb: &TrialBalance, currency: &CurrencyCode) {
    output::section(format!("Trial Balance {} ({})", tb.period, tb.user_id));
    println!("  {:<46} {:>16} {:>16}", "Account", "Debit", "Credit");
    for line in &tb.lines {
        println!(
            "  {:<6} {:<39} {:>16} {:>16}",
            line.account_code,
            line.account_name,
            amount_cell(line.debit_balance, currency),
            amount_cell(line.credit_balance, currency)
        );
    }
    println!(
        "  {:<46} {:>16} {:>16}",
        "Total",
        Money::new(tb.total_debit_balance, currency).to_string(),
        Money::new(tb.total_credit_balance, currency).to_string()
    );
    report_balance(tb.is_balanced, tb.difference, currency);
}

fn render_balance_sheet(sheet: &BalanceSheet, currency: &CurrencyCode) {
    output::section(format!("Balance Sheet as of {} ({})", sheet.as_of, sheet.user_id));
    render_side("Assets", &sheet.assets, currency);
    render_side("Liabilities", &sheet.liabilities, currency);
    render_side("Equity", &sheet.equity, currency);
    output::total(
        "Liabilities and Equity",
        Money::new(sheet.liabilities.total + sheet.equity.total, currency).accounting(),
        LABEL_WIDTH,
    );
    report_balance(sheet.is_balanced, sheet.difference, currency);
}

fn render_side(title: &str, side: &BalanceSheetSide, currency: &CurrencyCode) {
    println!("\n{title}");
    for section in &side.sections {
        render_section(section, currency);
    }
    output::total(
        format!("Total {title}"),
        Money::new(side.total, currency).accounting(),
        LABEL_WIDTH,
    );
}

fn render_income_statement(statement: &IncomeStatement, currency: &CurrencyCode) {
    output::section(format!(
        "Income Statement {} to {} ({})",
        statement.start, statement.end, statement.user_id
    ));
    render_section(&statement.revenue, currency);
    render_section(&statement.cost_of_sales, currency);
    output::total("Gross Profit", Money::new(statement.gross_profit, currency).accounting(), LABEL_WIDTH);
    render_section(&statement.operating_expenses, currency);
    output::total(
        "Operating Income",
        Money::new(statement.operating_income, currency).accounting(),
        LABEL_WIDTH,
    );
    render_section(&statement.other_income, currency);
    render_section(&statement.other_expenses, currency);
    output::total("Net Income", Money::new(statement.net_income, currency).accounting(), LABEL_WIDTH);
}

fn render_cash_flow(statement: &CashFlowStatement, currency: &CurrencyCode) {
    output::section(format!(
        "Cash Flow Statement {} to {} ({})",
        statement.start, statement.end, statement.user_id
    ));
    for section in [&statement.operating, &statement.investing, &statement.financing] {
        render_section(section, currency);
        output::total(
            format!("Net {}", section.title),
            Money::new(section.total, currency).accounting(),
            LABEL_WIDTH,
        );
    }
    println!();
    output::row(
        "Net Change in Cash",
        Money::new(statement.net_change_in_cash, currency).accounting(),
        LABEL_WIDTH,
    );
    output::row(
        "Beginning Cash",
        Money::new(statement.beginning_cash, currency).accounting(),
        LABEL_WIDTH,
    );
    output::total(
        "Ending Cash",
        Money::new(statement.ending_cash, currency).accounting(),
        LABEL_WIDTH,
    );
    if !statement.is_reconciled {
        output::warning(format!(
            "Cash accounts hold {}; the statement does not reconcile.",
            Money::new(statement.ledger_ending_cash, currency)
        ));
    }
}

fn render_section(section: &StatementSection, currency: &CurrencyCode) {
    if section.is_empty() {
        return;
    }
    println!("  {}", section.title);
    for line in &section.lines {
        let label = match &line.account_code {
            Some(code) => format!("  {code} {}", line.name),
            None => format!("  {}", line.name),
        };
        output::row(label, Money::new(line.amount, currency).accounting(), LABEL_WIDTH);
    }
}

fn report_balance(is_balanced: bool, difference: f64, currency: &CurrencyCode) {
    if is_balanced {
        output::success("Balanced");
    } else {
        output::warning(format!(
            "Out of balance by {}. Run `verify` to locate drift.",
            Money::new(difference, currency)
        ));
    }
}

fn amount_cell(amount: f64, currency: &CurrencyCode) -> String {
    if amount == 0.0 {
        String::new()
    } else {
        Money::new(amount, currency).to_string()
    }
}

fn take_flag<'a>(args: &[&'a str], flag: &str) -> Result<(Vec<&'a str>, Option<&'a str>), CommandError> {
    let mut rest = Vec::with_capacity(args.len());
    let mut value = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == flag {
            let next = iter
                .next()
                .ok_or_else(|| CommandError::usage(format!("{flag} needs a value")))?;
            value = Some(*next);
        } else {
            rest.push(*arg);
        }
    }
    Ok((rest, value))
}

fn resolve_date(context: &ShellContext, raw: &str) -> Result<NaiveDate, CommandError> {
    if raw.eq_ignore_ascii_case("today") {
        return Ok(context.engine.today());
    }
    parse_date(raw).map_err(|_| {
        CommandError::usage(format!("invalid date `{raw}` (use YYYY-MM-DD or `today`)"))
    })
}

fn looks_like_date(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("today") || parse_date(raw).is_ok()
}

fn parse_period(raw: &str) -> Result<Period, CommandError> {
    let invalid = || CommandError::usage(format!("invalid period `{raw}` (use YYYY-MM)"));
    let (year, month) = raw.split_once('-').ok_or_else(invalid)?;
    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    Period::new(year, month).map_err(|_| invalid())
}

fn parse_amount(raw: &str) -> Result<f64, CommandError> {
    let cleaned = raw.replace(',', "");
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::usage(format!("invalid amount `{raw}`")))
}

/// Parses `CODE:dr:AMOUNT` or `CODE:cr:AMOUNT`.
fn parse_line(raw: &str) -> Result<EntryLine, CommandError> {
    let mut parts = raw.splitn(3, ':');
    let (Some(code), Some(side), Some(amount)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CommandError::usage(format!(
            "invalid line `{raw}` (use CODE:dr:AMOUNT or CODE:cr:AMOUNT)"
        )));
    };
    let amount = parse_amount(amount)?;
    match side.to_ascii_lowercase().as_str() {
        "dr" | "d" | "debit" => Ok(EntryLine::debit(code, amount)),
        "cr" | "c" | "credit" => Ok(EntryLine::credit(code, amount)),
        other => Err(CommandError::usage(format!(
            "invalid side `{other}` in `{raw}` (use dr or cr)"
        ))),
    }
}

fn parse_account_type(raw: &str) -> Result<AccountType, CommandError> {
    match raw.to_ascii_lowercase().as_str() {
        "asset" | "assets" => Ok(AccountType::Asset),
        "liability" | "liabilities" => Ok(AccountType::Liability),
        "equity" => Ok(AccountType::Equity),
        "revenue" | "income" => Ok(AccountType::Revenue),
        "expense" | "expenses" => Ok(AccountType::Expense),
        _ => Err(CommandError::usage(format!("unknown account type `{raw}`"))),
    }
}

/// Resolves a full id, an id prefix of at least six characters, or a reference.
fn find_entry(context: &ShellContext, needle: &str) -> Result<JournalEntry, CommandError> {
    if let Ok(id) = Uuid::parse_str(needle) {
        return Ok(context.engine.get_entry(&context.user_id, id)?);
    }
    let lowered = needle.to_ascii_lowercase();
    let mut matches: Vec<JournalEntry> = context
        .engine
        .list_entries(&context.user_id, None)?
        .into_iter()
        .filter(|entry| {
            entry.reference.eq_ignore_ascii_case(needle)
                || (lowered.len() >= 6 && entry.id.simple().to_string().starts_with(&lowered))
        })
        .collect();
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(CommandError::usage(format!("no journal entry matches `{needle}`"))),
        n => Err(CommandError::usage(format!(
            "`{needle}` matches {n} entries; use the full id"
        ))),
    }
}

fn short_id(id: Uuid) -> String {
    let mut short = id.simple().to_string();
    short.truncate(8);
    short
}
