//! Parsing of shell command lines.
//!
//! Every command is slash-prefixed. Arguments are split shell-style so quoted
//! values (`/admin book add "War and Peace" Tolstoy 12.5 3`) stay together.

use crate::models::BookInput;
use crate::orders::OrderAction;

#[derive(Debug, Clone, PartialEq)]
pub enum ShopCommand {
    Help,
    Exit,
    Login { email: String, password: String },
    Register { name: String, email: String, password: String },
    Logout,
    WhoAmI,
    Session,
    Books { search: Option<String>, page: u32 },
    Book { id: i64 },
    Reviews { book_id: i64 },
    Review { book_id: i64, rating: u8, comment: String },
    Cart,
    Add { book_id: i64, quantity: u32 },
    Quantity { item_id: i64, quantity: u32 },
    Remove { item_id: i64 },
    ClearCart,
    Checkout,
    Orders,
    Order { id: i64 },
    Track { code: String },
    AdminOrder { action: OrderAction, id: i64 },
    AdminAddBook(BookInput),
    AdminEditBook { id: i64, book: BookInput },
    AdminRemoveBook { id: i64 },
}

impl ShopCommand {
    /// Commands that only work in the interactive shell.
    pub fn is_interactive(&self) -> bool {
        matches!(self, ShopCommand::Checkout)
    }
}

pub const HELP: &str = "\
Commands:
  /help                          - show commands
  /exit                          - quit
Account:
  /login <email> <password>      - sign in
  /register <name> <email> <pw>  - create an account
  /logout                        - sign out
  /whoami                        - show the signed-in profile
  /session                       - show session, journal and token expiry
Catalog:
  /books [search...] [--page N]  - list or search books
  /book <id>                     - book details
  /reviews <id>                  - reviews for a book
  /review <id> <1-5> [comment]   - review a book
Cart:
  /cart                          - show cart
  /add <bookId> [qty]            - add a book (default qty 1)
  /qty <itemId> <qty>            - change a line's quantity
  /rm <itemId>                   - remove a line
  /clear-cart                    - empty the cart
Orders:
  /checkout                      - shipping -> payment -> review -> place order
  /orders                        - your orders
  /order <id>                    - one order
  /track <claim-code>            - track an order without signing in
Admin:
  /admin process|deliver|cancel <orderId>
  /admin book add <title> <author> <price> <stock> [discount%]
  /admin book edit <id> <title> <author> <price> <stock> [discount%]
  /admin book rm <id>";

pub fn parse_command(line: &str) -> Result<ShopCommand, String> {
    let words = shell_words::split(line.trim()).map_err(|e| format!("Cannot parse line: {}", e))?;
    let (head, args) = match words.split_first() {
        Some((head, args)) => (head.as_str(), args),
        None => return Err("Empty command".to_string()),
    };
    if !head.starts_with('/') {
        return Err(format!(
            "Commands start with '/'. Did you mean /{}? Type /help for commands",
            head
        ));
    }

    match head {
        "/help" => Ok(ShopCommand::Help),
        "/exit" | "/quit" => Ok(ShopCommand::Exit),
        "/login" => match args {
            [email, password] => Ok(ShopCommand::Login {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => Err("Usage: /login <email> <password>".to_string()),
        },
        "/register" => match args {
            [name, email, password] => Ok(ShopCommand::Register {
                name: name.clone(),
                email: email.clone(),
                password: password.clone(),
            }),
            _ => Err("Usage: /register <name> <email> <password>".to_string()),
        },
        "/logout" => Ok(ShopCommand::Logout),
        "/whoami" => Ok(ShopCommand::WhoAmI),
        "/session" => Ok(ShopCommand::Session),
        "/books" => parse_books(args),
        "/book" => Ok(ShopCommand::Book {
            id: single_id(args, "/book <id>")?,
        }),
        "/reviews" => Ok(ShopCommand::Reviews {
            book_id: single_id(args, "/reviews <id>")?,
        }),
        "/review" => match args {
            [id, rating, comment @ ..] => Ok(ShopCommand::Review {
                book_id: number(id, "book id")?,
                rating: number(rating, "rating")?,
                comment: comment.join(" "),
            }),
            _ => Err("Usage: /review <id> <1-5> [comment]".to_string()),
        },
        "/cart" => Ok(ShopCommand::Cart),
        "/add" => match args {
            [id] => Ok(ShopCommand::Add {
                book_id: number(id, "book id")?,
                quantity: 1,
            }),
            [id, qty] => Ok(ShopCommand::Add {
                book_id: number(id, "book id")?,
                quantity: number(qty, "quantity")?,
            }),
            _ => Err("Usage: /add <bookId> [qty]".to_string()),
        },
        "/qty" => match args {
            [id, qty] => Ok(ShopCommand::Quantity {
                item_id: number(id, "item id")?,
                quantity: number(qty, "quantity")?,
            }),
            _ => Err("Usage: /qty <itemId> <qty>".to_string()),
        },
        "/rm" => Ok(ShopCommand::Remove {
            item_id: single_id(args, "/rm <itemId>")?,
        }),
        "/clear-cart" => Ok(ShopCommand::ClearCart),
        "/checkout" => Ok(ShopCommand::Checkout),
        "/orders" => Ok(ShopCommand::Orders),
        "/order" => Ok(ShopCommand::Order {
            id: single_id(args, "/order <id>")?,
        }),
        "/track" => match args {
            [code] => Ok(ShopCommand::Track { code: code.clone() }),
            _ => Err("Usage: /track <claim-code>".to_string()),
        },
        "/admin" => parse_admin(args),
        _ => Err(format!("Unknown command: {}", head)),
    }
}

fn parse_books(args: &[String]) -> Result<ShopCommand, String> {
    let mut page = 1;
    let mut terms = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--page" {
            let value = iter.next().ok_or("Usage: /books [search...] [--page N]")?;
            page = number(value, "page")?;
        } else {
            terms.push(arg.as_str());
        }
    }
    let search = (!terms.is_empty()).then(|| terms.join(" "));
    Ok(ShopCommand::Books { search, page })
}

fn parse_admin(args: &[String]) -> Result<ShopCommand, String> {
    const USAGE: &str = "Usage: /admin process|deliver|cancel <orderId> | /admin book add|edit|rm ...";
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    match words.as_slice() {
        [action, id] => match OrderAction::from_str(action) {
            Some(action) => Ok(ShopCommand::AdminOrder {
                action,
                id: number(id, "order id")?,
            }),
            None => Err(USAGE.to_string()),
        },
        ["book", "add", rest @ ..] => Ok(ShopCommand::AdminAddBook(book_input(rest)?)),
        ["book", "edit", id, rest @ ..] => Ok(ShopCommand::AdminEditBook {
            id: number(id, "book id")?,
            book: book_input(rest)?,
        }),
        ["book", "rm", id] => Ok(ShopCommand::AdminRemoveBook {
            id: number(id, "book id")?,
        }),
        _ => Err(USAGE.to_string()),
    }
}

fn book_input(args: &[&str]) -> Result<BookInput, String> {
    let (title, author, price, stock, discount) = match args {
        [title, author, price, stock] => (title, author, price, stock, None),
        [title, author, price, stock, discount] => (title, author, price, stock, Some(discount)),
        _ => return Err("Expected: <title> <author> <price> <stock> [discount%]".to_string()),
    };
    Ok(BookInput {
        title: title.to_string(),
        author: author.to_string(),
        price: number(price, "price")?,
        stock: number(stock, "stock")?,
        discount_percentage: match discount {
            Some(d) => number(d.trim_end_matches('%'), "discount")?,
            None => 0.0,
        },
        ..Default::default()
    })
}

fn single_id(args: &[String], usage: &str) -> Result<i64, String> {
    match args {
        [id] => number(id, "id"),
        _ => Err(format!("Usage: {}", usage)),
    }
}

fn number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("Invalid {}: '{}'", what, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_command("/help"), Ok(ShopCommand::Help));
        assert_eq!(parse_command("  /quit "), Ok(ShopCommand::Exit));
        assert_eq!(parse_command("/cart"), Ok(ShopCommand::Cart));
        assert_eq!(parse_command("/clear-cart"), Ok(ShopCommand::ClearCart));
        assert_eq!(parse_command("/session"), Ok(ShopCommand::Session));
    }

    #[test]
    fn test_cart_commands() {
        assert_eq!(
            parse_command("/add 12"),
            Ok(ShopCommand::Add { book_id: 12, quantity: 1 })
        );
        assert_eq!(
            parse_command("/add 12 3"),
            Ok(ShopCommand::Add { book_id: 12, quantity: 3 })
        );
        assert_eq!(
            parse_command("/qty 5 2"),
            Ok(ShopCommand::Quantity { item_id: 5, quantity: 2 })
        );
        assert_eq!(parse_command("/rm 5"), Ok(ShopCommand::Remove { item_id: 5 }));
        assert!(parse_command("/add twelve").unwrap_err().contains("Invalid book id"));
        assert!(parse_command("/qty 5 -1").is_err());
    }

    #[test]
    fn test_books_search_and_page() {
        assert_eq!(
            parse_command("/books"),
            Ok(ShopCommand::Books { search: None, page: 1 })
        );
        assert_eq!(
            parse_command("/books lord of the rings --page 2"),
            Ok(ShopCommand::Books {
                search: Some("lord of the rings".to_string()),
                page: 2
            })
        );
        assert!(parse_command("/books --page").is_err());
    }

    #[test]
    fn test_quoted_arguments() {
        assert_eq!(
            parse_command(r#"/review 3 5 "loved it, truly""#),
            Ok(ShopCommand::Review {
                book_id: 3,
                rating: 5,
                comment: "loved it, truly".to_string()
            })
        );
        assert!(parse_command(r#"/review 3 5 "unterminated"#).is_err());
    }

    #[test]
    fn test_track() {
        assert_eq!(
            parse_command("/track ALISH-20240315123456-XXXX"),
            Ok(ShopCommand::Track {
                code: "ALISH-20240315123456-XXXX".to_string()
            })
        );
        assert!(parse_command("/track").is_err());
    }

    #[test]
    fn test_admin_commands() {
        assert_eq!(
            parse_command("/admin deliver 9"),
            Ok(ShopCommand::AdminOrder {
                action: OrderAction::Deliver,
                id: 9
            })
        );
        match parse_command(r#"/admin book add "War and Peace" Tolstoy 12.5 3 10%"#) {
            Ok(ShopCommand::AdminAddBook(book)) => {
                assert_eq!(book.title, "War and Peace");
                assert_eq!(book.price, 12.5);
                assert_eq!(book.stock, 3);
                assert_eq!(book.discount_percentage, 10.0);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            parse_command("/admin book edit 4 Emma Austen 7 2"),
            Ok(ShopCommand::AdminEditBook { id: 4, .. })
        ));
        assert_eq!(
            parse_command("/admin book rm 4"),
            Ok(ShopCommand::AdminRemoveBook { id: 4 })
        );
        assert!(parse_command("/admin ship 9").is_err());
        assert!(parse_command("/admin book add OnlyTitle").is_err());
    }

    #[test]
    fn test_errors() {
        assert!(parse_command("").is_err());
        assert!(parse_command("cart").unwrap_err().contains("start with '/'"));
        assert_eq!(
            parse_command("/frobnicate"),
            Err("Unknown command: /frobnicate".to_string())
        );
        assert!(ShopCommand::Checkout.is_interactive());
        assert!(!ShopCommand::Cart.is_interactive());
    }
}
