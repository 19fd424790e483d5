use streamz_endwith::Source;

fn main() {
    let source = Source::<i32>::new();

    source
        .to_stream()
        .map(|x| x * 2)
        .filter(|x| *x > 5)
        .end_with([100])
        .tap(|x| println!("total = {x:?}"))
        .finalize(|| println!("done"))
        .subscribe(|_| {});

    for value in [1, 2, 3, 4] {
        source.emit(value);
    }
    source.complete();
}
