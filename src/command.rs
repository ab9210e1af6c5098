//! Command dispatcher - parse a framed line, route to a handler, reply.
//!
//! Only the verb (and the DEBUG sub-verb) is case-folded before lookup;
//! argument tokens keep their case so client ids and symbols stay
//! case-sensitive. The side token alone compares case-insensitively.

use tracing::{debug, info};

use crate::clock;
use crate::error::CommandError;
use crate::instrument::L1Snapshot;
use crate::order::{OrderKind, OrderRequest, Side};
use crate::reactor::Context;
use crate::session::{ConnId, Promotion};

const USAGE_AUTH: &str = "AUTH <PASSKEY> <CLIENTID>";
const USAGE_NEWL: &str = "NEWL <BUY|SELL> <SYMBOL> <QTY> <PRICE>";
const USAGE_SUB: &str = "SUB <GROUP_NAME>";
const USAGE_SEND: &str = "SEND <GROUP_NAME> <MESSAGE>";
const USAGE_DEBUG: &str = "DEBUG <AUTH|LIST|ORDERS|INSTRUMENTS> [ARGS]";

type CommandResult = Result<(), CommandError>;

/// Dispatch one framed, trimmed, non-empty line from `conn`.
pub fn dispatch(ctx: &mut Context, conn: ConnId, line: &str) {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&first) = tokens.first() else { return };

    let verb = first.to_ascii_uppercase();
    let result = match verb.as_str() {
        "PING" => ping(ctx, conn),
        "AUTH" => auth(ctx, conn, &tokens),
        "NEWL" => new_limit_order(ctx, conn, &tokens),
        "SUB" => subscribe(ctx, conn, &tokens),
        "SEND" => send_to_group(ctx, conn, &tokens),
        "DEBUG" => debug_command(ctx, conn, &tokens),
        _ => Err(CommandError::UnknownCommand),
    };

    if let Err(err) = result {
        debug!(conn, %verb, %err, "command rejected");
        ctx.sessions.reply(conn, err.wire());
    }
}

/// The authenticated client id for `conn`, or `Unauthorized`.
fn authed_client(ctx: &Context, conn: ConnId) -> Result<String, CommandError> {
    match ctx.sessions.get(conn) {
        Some(session) if session.authenticated && !session.client_id.is_empty() => {
            Ok(session.client_id.clone())
        }
        _ => Err(CommandError::Unauthorized),
    }
}

fn ping(ctx: &mut Context, conn: ConnId) -> CommandResult {
    ctx.sessions.reply(conn, "PONG\n");
    Ok(())
}

fn auth(ctx: &mut Context, conn: ConnId, tokens: &[&str]) -> CommandResult {
    if tokens.len() < 3 {
        return Err(CommandError::BadCommand { usage: USAGE_AUTH });
    }
    let passkey = tokens[1];
    let client_id = tokens[2];

    if !passkey.eq_ignore_ascii_case(&ctx.config.passkey) {
        return Err(CommandError::BadPasskey);
    }

    match ctx.sessions.promote(conn, client_id) {
        Some(Promotion::Promoted { evicted }) => {
            if let Some(old) = evicted {
                info!(
                    old_conn = old.conn,
                    conn,
                    client = client_id,
                    "superseding login"
                );
                old.close();
            }
            info!(conn, client = client_id, "authenticated");
            ctx.sessions.reply(conn, "OK AUTH\n");
        }
        Some(Promotion::Unchanged) => {
            ctx.sessions.reply(conn, "OK AUTH\n");
        }
        None => {} // connection vanished mid-dispatch
    }
    Ok(())
}

fn new_limit_order(ctx: &mut Context, conn: ConnId, tokens: &[&str]) -> CommandResult {
    let client_id = authed_client(ctx, conn)?;

    if tokens.len() < 5 {
        return Err(CommandError::BadCommand { usage: USAGE_NEWL });
    }

    let side = if tokens[1].eq_ignore_ascii_case("BUY") {
        Side::Buy
    } else if tokens[1].eq_ignore_ascii_case("SELL") {
        Side::Sell
    } else {
        return Err(CommandError::BadSide);
    };

    let symbol = tokens[2];
    if symbol.is_empty() || !ctx.registry.contains(symbol) {
        return Err(CommandError::BadSymbol);
    }

    let qty = match tokens[3].parse::<u64>() {
        Ok(q) if q > 0 => q,
        _ => return Err(CommandError::BadQty),
    };

    let price = match tokens[4].parse::<u64>() {
        Ok(p) if p > 0 => p,
        _ => return Err(CommandError::BadPrice),
    };

    let request = OrderRequest {
        order_id: ctx.ids.next(),
        client_order_id: String::new(),
        client_id: client_id.clone(),
        side,
        kind: OrderKind::Limit,
        price,
        qty,
        arrival_ns: clock::monotonic_ns(),
    };

    let Some(instrument) = ctx.registry.get_mut(symbol) else {
        return Err(CommandError::BadSymbol);
    };
    let order_id = request.order_id.clone();
    let report = instrument.place(request);

    debug!(
        conn,
        client = %client_id,
        %symbol,
        %order_id,
        fills = report.fills.len(),
        resting_qty = report.resting_qty,
        "order placed"
    );

    for fill in &report.fills {
        let exec = format!("EXEC {symbol} {}@{}\n", fill.qty, fill.price);
        ctx.notifier
            .notify_user(&ctx.sessions, &fill.maker_client, &exec);
        ctx.notifier
            .notify_user(&ctx.sessions, &fill.taker_client, &exec);

        let update = format_l1(&ctx.config.md_group, &fill.l1);
        ctx.notifier
            .notify_group(&ctx.sessions, &ctx.config.md_group, &update);
    }

    ctx.sessions.reply(conn, "REQUEST_MADE\n");
    Ok(())
}

fn subscribe(ctx: &mut Context, conn: ConnId, tokens: &[&str]) -> CommandResult {
    let client_id = authed_client(ctx, conn)?;

    if tokens.len() < 2 {
        return Err(CommandError::BadCommand { usage: USAGE_SUB });
    }
    let group = tokens[1];

    ctx.notifier.subscribe(group, &client_id);
    debug!(conn, client = %client_id, %group, "subscribed");
    ctx.sessions.reply(conn, "SUBSCRIBED\n");
    Ok(())
}

fn send_to_group(ctx: &mut Context, conn: ConnId, tokens: &[&str]) -> CommandResult {
    let client_id = authed_client(ctx, conn)?;

    if tokens.len() < 3 {
        return Err(CommandError::BadCommand { usage: USAGE_SEND });
    }
    let group = tokens[1];
    // Whitespace runs collapse to single spaces; good enough for a chat
    // surface framed on lines.
    let mut message = tokens[2..].join(" ");
    message.push('\n');

    ctx.notifier.notify_group(&ctx.sessions, group, &message);
    debug!(conn, client = %client_id, %group, "group message");
    ctx.sessions.reply(conn, "MESSAGE SENT\n");
    Ok(())
}

fn debug_command(ctx: &mut Context, conn: ConnId, tokens: &[&str]) -> CommandResult {
    let Some(sub) = tokens.get(1) else {
        return Err(CommandError::BadCommand { usage: USAGE_DEBUG });
    };

    match sub.to_ascii_uppercase().as_str() {
        "AUTH" => {
            let Some(&secret) = tokens.get(2) else {
                return Err(CommandError::BadCommand { usage: USAGE_DEBUG });
            };
            if secret != ctx.config.admin_secret {
                return Err(CommandError::BadSecret);
            }
            if let Some(session) = ctx.sessions.get_mut(conn) {
                session.admin = true;
                info!(conn, "admin authorized");
            }
            ctx.sessions.reply(conn, "AUTHORIZED\n");
            Ok(())
        }
        "LIST" => {
            require_admin(ctx, conn)?;
            let snapshot = render_sessions(ctx);
            ctx.sessions.reply(conn, snapshot);
            Ok(())
        }
        "ORDERS" => {
            require_admin(ctx, conn)?;
            let snapshot = render_orders(ctx);
            ctx.sessions.reply(conn, snapshot);
            Ok(())
        }
        "INSTRUMENTS" => {
            require_admin(ctx, conn)?;
            let snapshot = render_instruments(ctx);
            ctx.sessions.reply(conn, snapshot);
            Ok(())
        }
        _ => Err(CommandError::BadCommand { usage: USAGE_DEBUG }),
    }
}

fn require_admin(ctx: &Context, conn: ConnId) -> CommandResult {
    match ctx.sessions.get(conn) {
        Some(session) if session.admin => Ok(()),
        _ => Err(CommandError::Unauthorized),
    }
}

/// Render the L1 market-data block sent to the market-data group.
pub fn format_l1(group: &str, l1: &L1Snapshot) -> String {
    format!(
        "{group}_UPDATE\nLTP: {}\nHIGH: {}\nLOW: {}\nOPEN: {}\nCLOSE: {}\n",
        l1.last_trade_price, l1.high, l1.low, l1.open, l1.close
    )
}

fn render_sessions(ctx: &Context) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "At: {}", clock::wall_stamp());
    let _ = writeln!(out, "Sessions({})", ctx.sessions.len());
    for session in ctx.sessions.iter_ordered() {
        let _ = writeln!(
            out,
            "conn={} peer={} authenticated={} client={}",
            session.conn, session.peer, session.authenticated, session.client_id
        );
    }
    out
}

fn render_orders(ctx: &Context) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "At: {}", clock::wall_stamp());
    for symbol in ctx.registry.symbols() {
        let Some(instrument) = ctx.registry.get(symbol) else {
            continue;
        };
        let _ = writeln!(out, "SYM: {symbol}");
        for (label, side) in [("BUY", Side::Buy), ("SELL", Side::Sell)] {
            let prices: Vec<String> = instrument
                .ladder(side, 10)
                .iter()
                .map(|level| level.price.to_string())
                .collect();
            let _ = writeln!(out, "    {label}: {}", prices.join(" "));
        }
    }
    out
}

fn render_instruments(ctx: &Context) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "At: {}", clock::wall_stamp());
    let _ = writeln!(out, "Instruments({})", ctx.registry.len());
    for symbol in ctx.registry.symbols() {
        let Some(instrument) = ctx.registry.get(symbol) else {
            continue;
        };
        let stats = instrument.stats();
        let traded_at = stats
            .last_trade_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "none".to_string());
        let _ = writeln!(out, "--------------------------------------");
        let _ = writeln!(out, "{symbol}:");
        let _ = writeln!(out, "    LTP: {}", stats.last_trade_price);
        let _ = writeln!(out, "    LTS: {}", stats.last_trade_size);
        let _ = writeln!(out, "    LTT: {traded_at}");
        let _ = writeln!(out, "    High: {}", stats.high);
        let _ = writeln!(out, "    Low: {}", stats.low);
        let _ = writeln!(out, "    Open: {}", stats.open);
        let _ = writeln!(out, "    Close: {}", stats.close);
        let _ = writeln!(out, "--------------------------------------");
    }
    out
}
