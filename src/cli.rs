use crate::api::ApiClient;
use crate::cart::CartStore;
use crate::catalog::Catalog;
use crate::checkout::{
    Checkout, CheckoutError, CheckoutStep, PaymentDetails, PaymentMethod, ShippingDetails,
};
use crate::commands::{parse_command, ShopCommand, HELP};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::journal::Journal;
use crate::models::{BookDetails, BookSummary, Order};
use crate::orders::OrderTracker;
use crate::session::SessionStore;
use crate::storage::SessionStorage;
use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;

pub struct Context {
    pub config: Config,
    pub api: ApiClient,
    pub catalog: Catalog,
    pub session: RefCell<SessionStore<Box<dyn SessionStorage>>>,
    pub cart: RefCell<CartStore>,
    pub checkout: RefCell<Checkout>,
    pub journal: RefCell<Journal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Source of answers for the checkout wizard.
pub trait Prompt {
    /// `None` when input ends or the user interrupts.
    fn ask(&mut self, question: &str) -> Option<String>;
}

impl Prompt for DefaultEditor {
    fn ask(&mut self, question: &str) -> Option<String> {
        self.readline(&format!("  {}: ", question)).ok()
    }
}

impl Context {
    pub fn new(
        config: Config,
        api: ApiClient,
        session: SessionStore<Box<dyn SessionStorage>>,
        journal: Journal,
    ) -> Self {
        let catalog = Catalog::new(config.page_size());
        Self {
            config,
            api,
            catalog,
            session: RefCell::new(session),
            cart: RefCell::new(CartStore::new()),
            checkout: RefCell::new(Checkout::new()),
            journal: RefCell::new(journal),
        }
    }

    /// Journal writes never fail a command.
    fn journal(&self, f: impl FnOnce(&mut Journal) -> Result<()>) {
        if let Err(e) = f(&mut self.journal.borrow_mut()) {
            tracing::warn!("journal write failed: {}", e);
        }
    }

    fn require_auth(&self) -> ApiResult<String> {
        self.session.borrow_mut().require_auth()
    }

    fn require_admin(&self) -> Result<String> {
        let auth = self.require_auth()?;
        if !self.session.borrow().is_admin() {
            bail!("This command needs the Admin role");
        }
        Ok(auth)
    }

    /// Drop every piece of per-user state.
    fn end_session(&self, reason: &str) {
        self.session.borrow_mut().logout();
        self.cart.borrow_mut().reset();
        self.checkout.borrow_mut().reset();
        self.journal(|j| j.logout(reason));
    }

    fn on_error(&self, command: &str, error: &anyhow::Error) {
        let api_error = error.downcast_ref::<ApiError>().or_else(|| {
            match error.downcast_ref::<CheckoutError>() {
                Some(CheckoutError::Api(e)) => Some(e),
                _ => None,
            }
        });
        let Some(api_error) = api_error else {
            return;
        };
        self.journal(|j| j.api_error(command, &api_error.to_string()));
        if !api_error.is_auth_failure() {
            return;
        }
        match api_error {
            ApiError::SessionExpired => self.end_session("expired"),
            ApiError::Unauthorized(_) => self.end_session("rejected"),
            _ => {
                self.cart.borrow_mut().reset();
            }
        }
    }

    fn prompt_label(&self) -> String {
        match self.session.borrow().user() {
            Some(user) => format!("{}> ", user.display_name()),
            None => "shelf> ".to_string(),
        }
    }
}

pub fn run_once(ctx: &Context, line: &str) -> Result<()> {
    let mut out = std::io::stdout();
    execute_line(ctx, line, None, &mut out)?;
    Ok(())
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // Missing on first run.
        let _ = rl.load_history(path);
    }

    println!(
        "shelf - {} - type /help for commands, /exit to quit",
        ctx.config.base_url()
    );
    if let Some(user) = ctx.session.borrow().user() {
        println!("Signed in as {}", user.display_name());
    }

    let mut out = std::io::stdout();
    loop {
        let label = ctx.prompt_label();
        match rl.readline(&label) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if keep_in_history(line) {
                    rl.add_history_entry(line)?;
                }

                match execute_line(&ctx, line, Some(&mut rl as &mut dyn Prompt), &mut out) {
                    Ok(Flow::Exit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            tracing::warn!("could not save history: {}", e);
        }
    }
    Ok(())
}

/// Lines that carry a password stay out of the history file, including
/// malformed ones that fail to parse.
fn keep_in_history(line: &str) -> bool {
    match parse_command(line) {
        Ok(ShopCommand::Login { .. } | ShopCommand::Register { .. }) => false,
        Ok(_) => true,
        Err(_) => !matches!(
            line.split_whitespace().next(),
            Some("/login" | "/register")
        ),
    }
}

fn history_path() -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(".shelf");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("history"))
}

/// Parse and run one command line. Failures are journaled and, when they
/// mean the session is unusable, end it before the error is returned.
pub fn execute_line(
    ctx: &Context,
    line: &str,
    prompt: Option<&mut dyn Prompt>,
    out: &mut dyn Write,
) -> Result<Flow> {
    let command = parse_command(line).map_err(anyhow::Error::msg)?;
    if command.is_interactive() && prompt.is_none() {
        bail!("{} only works in the interactive shell", line.trim());
    }
    let name = line.split_whitespace().next().unwrap_or_default();

    let result = dispatch(ctx, command, prompt, out);
    if let Err(e) = &result {
        tracing::debug!(command = name, "command failed: {:#}", e);
        ctx.on_error(name, e);
    }
    result
}

fn dispatch(
    ctx: &Context,
    command: ShopCommand,
    prompt: Option<&mut dyn Prompt>,
    out: &mut dyn Write,
) -> Result<Flow> {
    match command {
        ShopCommand::Help => writeln!(out, "{}", HELP)?,
        ShopCommand::Exit => return Ok(Flow::Exit),

        ShopCommand::Login { email, password } => {
            // A rejected password is not a rejected session.
            let mut session = ctx.session.borrow_mut();
            let user = session
                .sign_in(&ctx.api, &email, &password)
                .map_err(|e| anyhow::anyhow!("Login failed: {}", e))?;
            writeln!(out, "Signed in as {} <{}>", user.display_name(), user.email)?;
            drop(session);
            ctx.cart.borrow_mut().reset();
            ctx.checkout.borrow_mut().reset();
            ctx.journal(|j| j.login(&email, false));
        }
        ShopCommand::Register {
            name,
            email,
            password,
        } => {
            ctx.session
                .borrow()
                .register(&ctx.api, &name, &email, &password)?;
            writeln!(out, "Registered {}. Use /login to sign in", email)?;
        }
        ShopCommand::Logout => {
            if ctx.session.borrow().session().is_none() {
                writeln!(out, "Not logged in")?;
            } else {
                ctx.end_session("user");
                writeln!(out, "Signed out")?;
            }
        }
        ShopCommand::WhoAmI => match ctx.session.borrow().user() {
            Some(user) => {
                writeln!(out, "{} <{}>", user.display_name(), user.email)?;
                if !user.roles.is_empty() {
                    writeln!(out, "Roles: {}", user.roles.join(", "))?;
                }
            }
            None => writeln!(out, "Not logged in")?,
        },
        ShopCommand::Session => {
            {
                let journal = ctx.journal.borrow();
                writeln!(out, "Session: {}", journal.session_id())?;
                match &journal.path {
                    Some(path) => writeln!(out, "Journal: {}", path.display())?,
                    None => writeln!(out, "Journal: off")?,
                }
            }
            writeln!(out, "Backend: {}", ctx.config.base_url())?;
            let mut session = ctx.session.borrow_mut();
            let had_token = session.session().is_some();
            if session.is_session_valid() {
                match session.user() {
                    Some(user) => writeln!(out, "User: {}", user.email)?,
                    None => writeln!(out, "User: profile not loaded")?,
                }
                if let Some(s) = session.session() {
                    writeln!(out, "Token expires: {}", s.expires_at.to_rfc3339())?;
                }
            } else if had_token {
                drop(session);
                ctx.end_session("expired");
                writeln!(out, "Token expired; signed out")?;
            } else {
                writeln!(out, "Not logged in")?;
            }
        }

        ShopCommand::Books { search, page } => {
            let books = ctx.catalog.list_books(&ctx.api, search.as_deref(), page)?;
            if books.is_empty() {
                writeln!(out, "No books found")?;
            }
            for book in &books {
                writeln!(out, "{}", book_line(book))?;
            }
        }
        ShopCommand::Book { id } => {
            let book = ctx.catalog.book(&ctx.api, id)?;
            render_book(out, &book)?;
        }
        ShopCommand::Reviews { book_id } => {
            let reviews = ctx.catalog.reviews(&ctx.api, book_id)?;
            if reviews.is_empty() {
                writeln!(out, "No reviews yet")?;
            }
            for review in &reviews {
                writeln!(
                    out,
                    "  {}/5 {}: {}",
                    review.rating, review.user_name, review.comment
                )?;
            }
        }
        ShopCommand::Review {
            book_id,
            rating,
            comment,
        } => {
            let auth = ctx.require_auth()?;
            ctx.catalog
                .add_review(&ctx.api, &auth, book_id, rating, &comment)?;
            writeln!(out, "Review added")?;
        }

        ShopCommand::Cart => {
            let auth = ctx.require_auth()?;
            let mut cart = ctx.cart.borrow_mut();
            cart.fetch_cart(&ctx.api, &auth)?;
            render_cart(out, &cart)?;
        }
        ShopCommand::Add { book_id, quantity } => {
            mutate_cart(ctx, out, "add", book_id, |cart, api, auth| {
                cart.add_item(api, auth, book_id, quantity).map(|_| ())
            })?;
        }
        ShopCommand::Quantity { item_id, quantity } => {
            mutate_cart(ctx, out, "update", item_id, |cart, api, auth| {
                cart.update_item_quantity(api, auth, item_id, quantity)
                    .map(|_| ())
            })?;
        }
        ShopCommand::Remove { item_id } => {
            mutate_cart(ctx, out, "remove", item_id, |cart, api, auth| {
                cart.remove_item(api, auth, item_id).map(|_| ())
            })?;
        }
        ShopCommand::ClearCart => {
            mutate_cart(ctx, out, "clear", 0, |cart, api, auth| {
                cart.clear_cart(api, auth).map(|_| ())
            })?;
        }

        ShopCommand::Checkout => match prompt {
            Some(prompt) => run_checkout(ctx, prompt, out)?,
            None => bail!("/checkout only works in the interactive shell"),
        },
        ShopCommand::Orders => {
            let auth = ctx.require_auth()?;
            let orders = OrderTracker::my_orders(&ctx.api, &auth)?;
            if orders.is_empty() {
                writeln!(out, "No orders yet")?;
            }
            for order in &orders {
                writeln!(out, "{}", order_line(order))?;
            }
        }
        ShopCommand::Order { id } => {
            let auth = ctx.require_auth()?;
            let order = OrderTracker::order(&ctx.api, &auth, id)?;
            render_order(out, &order)?;
        }
        ShopCommand::Track { code } => {
            let order = OrderTracker::track(&ctx.api, &code)?;
            render_order(out, &order)?;
        }

        ShopCommand::AdminOrder { action, id } => {
            let auth = ctx.require_admin()?;
            let result = OrderTracker::transition(&ctx.api, &auth, id, action);
            let status = result.as_ref().ok().map(|o| o.status.as_str());
            ctx.journal(|j| j.order_transition(id, action.as_str(), status));
            let order = result?;
            writeln!(out, "Order #{} is now {}", order.id, order.status)?;
        }
        ShopCommand::AdminAddBook(book) => {
            let auth = ctx.require_admin()?;
            let created = ctx.catalog.create_book(&ctx.api, &auth, &book)?;
            writeln!(out, "Created {}", book_line(&created.summary))?;
        }
        ShopCommand::AdminEditBook { id, book } => {
            let auth = ctx.require_admin()?;
            let updated = ctx.catalog.update_book(&ctx.api, &auth, id, &book)?;
            writeln!(out, "Updated {}", book_line(&updated.summary))?;
        }
        ShopCommand::AdminRemoveBook { id } => {
            let auth = ctx.require_admin()?;
            ctx.catalog.delete_book(&ctx.api, &auth, id)?;
            writeln!(out, "Deleted book #{}", id)?;
        }
    }
    Ok(Flow::Continue)
}

/// Run a cart mutation, journal it, and show the refetched cart.
fn mutate_cart(
    ctx: &Context,
    out: &mut dyn Write,
    action: &str,
    target: i64,
    f: impl FnOnce(&mut CartStore, &ApiClient, &str) -> ApiResult<()>,
) -> Result<()> {
    let auth = ctx.require_auth()?;
    let mut cart = ctx.cart.borrow_mut();
    let result = f(&mut *cart, &ctx.api, &auth);
    let items = cart.items().len();
    ctx.journal(|j| j.cart_mutation(action, target, result.is_ok(), items));
    result?;
    render_cart(out, &cart)?;
    Ok(())
}

enum Answer {
    Value(String),
    Back,
    Cancel,
}

/// Empty input keeps the current value.
fn ask(prompt: &mut dyn Prompt, question: &str, current: &str) -> Answer {
    let question = if current.is_empty() {
        question.to_string()
    } else {
        format!("{} [{}]", question, current)
    };
    match prompt.ask(&question) {
        None => Answer::Cancel,
        Some(answer) => match answer.trim() {
            "cancel" => Answer::Cancel,
            "back" => Answer::Back,
            "" => Answer::Value(current.to_string()),
            value => Answer::Value(value.to_string()),
        },
    }
}

fn ask_shipping(prompt: &mut dyn Prompt, current: &ShippingDetails) -> Form<ShippingDetails> {
    let mut details = current.clone();
    for (label, field) in [
        ("Full name", &mut details.full_name),
        ("Address", &mut details.address_line),
        ("City", &mut details.city),
        ("Postal code", &mut details.postal_code),
        ("Country", &mut details.country),
        ("Phone (optional)", &mut details.phone),
    ] {
        match ask(prompt, label, field.as_str()) {
            Answer::Value(value) => *field = value,
            Answer::Back => return Form::Back,
            Answer::Cancel => return Form::Cancel,
        }
    }
    Form::Done(details)
}

fn ask_payment(prompt: &mut dyn Prompt, current: &PaymentDetails) -> Form<PaymentDetails> {
    let method = loop {
        match ask(prompt, "Payment method (card/cash)", current.method.as_str()) {
            Answer::Value(value) => match PaymentMethod::from_str(&value) {
                Some(method) => break method,
                None => continue,
            },
            Answer::Back => return Form::Back,
            Answer::Cancel => return Form::Cancel,
        }
    };
    if method == PaymentMethod::CashOnDelivery {
        return Form::Done(PaymentDetails::cash_on_delivery());
    }

    let mut details = PaymentDetails {
        method,
        ..current.clone()
    };
    for (label, field) in [
        ("Cardholder name", &mut details.cardholder_name),
        ("Card number", &mut details.card_number),
        ("Expiry (MM/YY)", &mut details.card_expiry),
        ("CVC", &mut details.card_cvc),
    ] {
        match ask(prompt, label, field.as_str()) {
            Answer::Value(value) => *field = value,
            Answer::Back => return Form::Back,
            Answer::Cancel => return Form::Cancel,
        }
    }
    Form::Done(details)
}

/// Outcome of filling in one wizard form.
enum Form<T> {
    Done(T),
    Back,
    Cancel,
}

/// Walk the wizard from wherever it was left. Typing `back` returns to the
/// previous step and `cancel` (or Ctrl-D) pauses the wizard with its forms
/// kept for the next `/checkout`.
fn run_checkout(ctx: &Context, prompt: &mut dyn Prompt, out: &mut dyn Write) -> Result<()> {
    let auth = ctx.require_auth()?;
    {
        let mut cart = ctx.cart.borrow_mut();
        cart.fetch_cart(&ctx.api, &auth)?;
        if cart.is_empty() {
            writeln!(out, "Your cart is empty")?;
            return Ok(());
        }
        render_cart(out, &cart)?;
    }

    let mut checkout = ctx.checkout.borrow_mut();
    if checkout.step() == CheckoutStep::Confirmed {
        checkout.reset();
    }

    loop {
        match checkout.step() {
            CheckoutStep::Shipping => {
                writeln!(out, "Shipping address (type 'cancel' to stop)")?;
                let details = match ask_shipping(prompt, checkout.shipping()) {
                    Form::Done(details) => details,
                    Form::Back | Form::Cancel => break,
                };
                checkout.set_shipping(details)?;
                if let Err(e) = checkout.next() {
                    writeln!(out, "{}", e)?;
                }
            }
            CheckoutStep::Payment => {
                writeln!(out, "Payment (type 'back' to edit the address)")?;
                let details = match ask_payment(prompt, checkout.payment()) {
                    Form::Done(details) => details,
                    Form::Back => {
                        checkout.back()?;
                        continue;
                    }
                    Form::Cancel => break,
                };
                checkout.set_payment(details)?;
                if let Err(e) = checkout.next() {
                    writeln!(out, "{}", e)?;
                }
            }
            CheckoutStep::Review => {
                render_review(out, &checkout, &ctx.cart.borrow())?;
                match ask(prompt, "Place order? (yes/back/cancel)", "") {
                    Answer::Value(v) if v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("y") => {}
                    Answer::Value(_) => continue,
                    Answer::Back => {
                        checkout.back()?;
                        continue;
                    }
                    Answer::Cancel => break,
                }

                let auth = ctx.require_auth()?;
                let mut cart = ctx.cart.borrow_mut();
                match checkout.place_order(&ctx.api, &auth, &mut cart) {
                    Ok(confirmation) => {
                        writeln!(
                            out,
                            "Order #{} placed. Status: {}. Total: {}",
                            confirmation.order_id,
                            confirmation.status,
                            money(confirmation.total_price)
                        )?;
                        writeln!(
                            out,
                            "Claim code: {} (use /track {} to follow it)",
                            confirmation.claim_code, confirmation.claim_code
                        )?;
                        if !confirmation.cart_cleared {
                            writeln!(
                                out,
                                "Note: the cart was not emptied and still holds the ordered books. \
                                 Run /clear-cart before shopping again"
                            )?;
                        }
                        let (id, code, total) = (
                            confirmation.order_id,
                            confirmation.claim_code.clone(),
                            confirmation.total_price,
                        );
                        ctx.journal(|j| j.order_placed(id, &code, total));
                        return Ok(());
                    }
                    Err(CheckoutError::Api(e)) if e.is_auth_failure() => return Err(e.into()),
                    Err(e) => {
                        let message = e.to_string();
                        if let CheckoutError::Api(api_error) = &e {
                            ctx.journal(|j| j.api_error("/checkout", &api_error.to_string()));
                        }
                        writeln!(out, "Order failed: {}. Answer yes to retry", message)?;
                    }
                }
            }
            CheckoutStep::Confirmed => return Ok(()),
        }
    }

    writeln!(out, "Checkout paused. Run /checkout to resume")?;
    Ok(())
}

fn money(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// The server's list price, with its discount tag. Discounted amounts are
/// the server's to compute and only appear on orders.
fn list_price(book: &BookSummary) -> String {
    if book.discount_percentage > 0.0 {
        format!("{} (-{}%)", money(book.price), book.discount_percentage)
    } else {
        money(book.price)
    }
}

fn book_line(book: &BookSummary) -> String {
    let price = list_price(book);
    let stock = if book.stock > 0 {
        format!("{} in stock", book.stock)
    } else {
        "out of stock".to_string()
    };
    format!(
        "{:>5}  {} by {}  {}  {}",
        format!("#{}", book.id),
        book.title,
        book.author,
        price,
        stock
    )
}

fn render_book(out: &mut dyn Write, book: &BookDetails) -> Result<()> {
    writeln!(out, "{}", book_line(&book.summary))?;
    if let Some(isbn) = &book.isbn {
        writeln!(out, "  ISBN: {}", isbn)?;
    }
    if let Some(publisher) = &book.publisher {
        writeln!(out, "  Publisher: {}", publisher)?;
    }
    if let Some(category) = &book.category {
        writeln!(out, "  Category: {}", category)?;
    }
    if !book.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", book.description)?;
    }
    Ok(())
}

fn render_cart(out: &mut dyn Write, cart: &CartStore) -> Result<()> {
    if cart.is_empty() {
        writeln!(out, "Your cart is empty")?;
        return Ok(());
    }
    let mut estimate = 0.0;
    for item in cart.items() {
        let book = &item.book;
        estimate += book.price * (1.0 - book.discount_percentage / 100.0) * item.quantity as f64;
        writeln!(
            out,
            "  [{}] {} x{} @ {}",
            item.id,
            book.title,
            item.quantity,
            list_price(book)
        )?;
    }
    // The order total is priced by the server at checkout.
    writeln!(
        out,
        "  {} item(s), estimated subtotal {} (final total set at checkout)",
        cart.item_count(),
        money(estimate)
    )?;
    Ok(())
}

fn render_review(out: &mut dyn Write, checkout: &Checkout, cart: &CartStore) -> Result<()> {
    let ship = checkout.shipping();
    writeln!(out, "Review your order")?;
    writeln!(out, "  Ship to: {}", ship.full_name)?;
    writeln!(
        out,
        "           {}, {} {}, {}",
        ship.address_line, ship.city, ship.postal_code, ship.country
    )?;
    let payment = checkout.payment();
    match payment.method {
        PaymentMethod::Card => writeln!(out, "  Payment: card {}", payment.masked_card())?,
        PaymentMethod::CashOnDelivery => writeln!(out, "  Payment: cash on delivery")?,
    }
    render_cart(out, cart)
}

fn order_line(order: &Order) -> String {
    let date = order
        .created_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "{:>6}  {:<10}  {:>9}  {}  {}",
        format!("#{}", order.id),
        order.status.as_str(),
        money(order.total_price),
        order.claim_code,
        date
    )
}

fn render_order(out: &mut dyn Write, order: &Order) -> Result<()> {
    writeln!(out, "Order #{} ({})", order.id, order.status)?;
    writeln!(out, "  Claim code: {}", order.claim_code)?;
    for item in &order.items {
        writeln!(
            out,
            "  {} x{} @ {}",
            item.book.title,
            item.quantity,
            money(item.unit_price)
        )?;
    }
    if order.discount_applied > 0.0 {
        writeln!(out, "  Discount: -{}", money(order.discount_applied))?;
    }
    writeln!(out, "  Total: {}", money(order.total_price))?;
    Ok(())
}
